use std::path::{Path, PathBuf};

mod show;
mod terminal;

use clap::ArgAction;
use family_tree::{
    Config, EditError, FileBackend, InsertError, Layout, PersonId, Relation, Store,
};
use non_empty_string::NonEmptyString;
use show::Show;
use terminal::{prompt_to_proceed, Colorize};
use tracing::instrument;

/// Parse the name of a new person, rejecting blank input.
fn parse_name(s: &str) -> Result<NonEmptyString, String> {
    NonEmptyString::new(s.trim().to_string())
        .map_err(|_| "Enter a name for the new person".to_string())
}

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global=true)]
    verbose: u8,

    /// The data directory holding `config.toml` and the stored tree
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        let config = load_config(&self.root);
        let store = Store::open(FileBackend::new(self.root), config.storage_key());

        self.command
            .unwrap_or_else(|| Command::Show(Show::default()))
            .run(store, &config)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

fn load_config(root: &Path) -> Config {
    let path = root.join("config.toml");
    Config::load(&path).unwrap_or_else(|e| {
        tracing::debug!("Failed to load config: {e}");
        Config::default()
    })
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Print the tree as an outline (default)
    Show(Show),

    /// Add a person at the top level
    Add(Add),

    /// Add a relative of an existing person
    Relate(Relate),

    /// Delete a person
    ///
    /// Their children pass to the surviving spouse, or become top-level
    /// entries if no parent remains.
    Delete(Delete),

    /// Print the diagram layout as JSON
    Layout(Diagram),

    /// Discard the whole tree and start fresh
    Reset(Reset),
}

impl Command {
    fn run(self, mut store: Store<FileBackend>, config: &Config) -> anyhow::Result<()> {
        match self {
            Self::Show(command) => command.run(&store)?,
            Self::Add(command) => command.run(&mut store)?,
            Self::Relate(command) => command.run(&mut store)?,
            Self::Delete(command) => command.run(&mut store)?,
            Self::Layout(command) => command.run(&store, config)?,
            Self::Reset(command) => command.run(&mut store)?,
        }
        Ok(())
    }
}

#[derive(Debug, clap::Parser)]
pub struct Add {
    /// Name of the new person
    #[arg(value_parser = parse_name)]
    name: NonEmptyString,
}

impl Add {
    #[instrument(skip(store))]
    fn run(self, store: &mut Store<FileBackend>) -> anyhow::Result<()> {
        let name = self.name.into_inner();
        let id = store.add_root(name.as_str())?;
        println!("{}", format!("Added {name} [{id}]").success());
        Ok(())
    }
}

#[derive(Debug, clap::Parser)]
pub struct Relate {
    /// Id of the existing person
    target: PersonId,

    /// How the new person relates to them: child, parent, sibling or spouse
    relation: Relation,

    /// Name of the new person
    #[arg(value_parser = parse_name)]
    name: NonEmptyString,
}

impl Relate {
    #[instrument(skip(store))]
    fn run(self, store: &mut Store<FileBackend>) -> anyhow::Result<()> {
        let name = self.name.into_inner();

        match store.insert_related(&self.target, self.relation, name.as_str()) {
            Ok(id) => {
                let target = store
                    .tree()
                    .person(&self.target)
                    .map_or_else(|| self.target.to_string(), |p| p.name.clone());
                println!(
                    "{}",
                    format!("Added {name} [{id}] as {} of {target}", self.relation).success()
                );
            }
            Err(EditError::Insert(InsertError::UnknownPerson(id))) => {
                anyhow::bail!("Person {id} not found");
            }
            Err(EditError::Insert(notice)) => {
                eprintln!("{}", notice.to_string().warning());
            }
            Err(EditError::Storage(e)) => return Err(e.into()),
        }

        Ok(())
    }
}

#[derive(Debug, clap::Parser)]
pub struct Delete {
    /// Id of the person to delete
    id: PersonId,

    /// Skip confirmation prompts
    #[arg(long, short)]
    yes: bool,
}

impl Delete {
    #[instrument(skip(store))]
    fn run(self, store: &mut Store<FileBackend>) -> anyhow::Result<()> {
        let Some(person) = store.tree().person(&self.id) else {
            anyhow::bail!("Person {} not found", self.id);
        };
        let name = person.name.clone();

        if !self.yes {
            println!("Will delete {name} [{}]", self.id);
            if !person.children.is_empty() {
                let note = match &person.spouse_id {
                    Some(_) => "Their children stay with their spouse.",
                    None => "Children left without a parent move to the top level.",
                };
                println!("{}", note.dim());
            }
            if !prompt_to_proceed()? {
                println!("Cancelled");
                std::process::exit(130);
            }
        }

        store.delete_person(&self.id)?;
        println!(
            "{}",
            format!(
                "Deleted {name} from {}",
                store.backend().path(store.key()).display()
            )
            .success()
        );
        Ok(())
    }
}

#[derive(Debug, clap::Parser)]
pub struct Diagram {
    /// Write the layout to a file instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,
}

impl Diagram {
    #[instrument(skip(store, config))]
    fn run(self, store: &Store<FileBackend>, config: &Config) -> anyhow::Result<()> {
        let layout = Layout::compute_or_empty(store.tree(), &config.layout);
        let json = serde_json::to_string_pretty(&layout)?;

        match self.output {
            Some(path) => {
                std::fs::write(&path, json)?;
                println!(
                    "{}",
                    format!(
                        "Wrote {} nodes ({} x {}) to {}",
                        layout.nodes.len(),
                        layout.width,
                        layout.height,
                        path.display()
                    )
                    .success()
                );
            }
            None => println!("{json}"),
        }

        Ok(())
    }
}

#[derive(Debug, clap::Parser)]
pub struct Reset {
    /// Skip confirmation prompts
    #[arg(long, short)]
    yes: bool,
}

impl Reset {
    #[instrument(skip(store))]
    fn run(self, store: &mut Store<FileBackend>) -> anyhow::Result<()> {
        if !self.yes {
            println!(
                "{}",
                format!(
                    "This permanently deletes all {} people in {}.",
                    store.tree().len(),
                    store.backend().path(store.key()).display()
                )
                .warning()
            );
            if !prompt_to_proceed()? {
                println!("Cancelled");
                std::process::exit(130);
            }
        }

        store.reset()?;
        println!("{}", "Started a fresh tree".success());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn blank_names_are_rejected() {
        assert!(parse_name("   ").is_err());
        assert_eq!(parse_name("  Alex ").unwrap().into_inner(), "Alex");
    }

    #[test]
    fn show_is_the_default_command() {
        let cli = Cli::try_parse_from(["ftree"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn relate_parses_relation_names() {
        let cli = Cli::try_parse_from(["ftree", "relate", "abc123", "Spouse", "Jamie"]).unwrap();
        let Some(Command::Relate(relate)) = cli.command else {
            panic!("expected relate");
        };
        assert_eq!(relate.target, PersonId::from("abc123"));
        assert_eq!(relate.relation, Relation::Spouse);
    }

    #[test]
    fn unknown_relation_is_a_usage_error() {
        assert!(Cli::try_parse_from(["ftree", "relate", "abc123", "cousin", "Jamie"]).is_err());
    }
}
