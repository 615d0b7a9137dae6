use std::collections::HashSet;

use clap::Parser;
use family_tree::{FileBackend, PersonId, Store, Tree};
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, Default, Parser)]
#[command(about = "Print the family tree as an outline")]
pub struct Show {
    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "pretty")]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Pretty,
    Json,
}

impl Show {
    #[instrument(level = "debug", skip_all)]
    pub fn run(self, store: &Store<FileBackend>) -> anyhow::Result<()> {
        let tree = store.tree();

        match self.output {
            OutputFormat::Pretty if tree.is_empty() => {
                println!("{}", "No one here yet. Start with `ftree add <NAME>`.".dim());
            }
            OutputFormat::Pretty => {
                for line in outline(tree) {
                    println!("{line}");
                }
            }
            OutputFormat::Json => println!("{}", family_tree::storage::encode(tree)?),
        }

        Ok(())
    }
}

/// Renders the tree top-down, one person or couple per line.
///
/// Someone reachable along more than one path is written out in full only
/// the first time.
fn outline(tree: &Tree) -> Vec<String> {
    let mut writer = Outline {
        tree,
        seen: HashSet::new(),
        lines: Vec::new(),
    };
    for root in tree.root_ids() {
        if !writer.seen.contains(root) {
            writer.family(root, "", None);
        }
    }
    writer.lines
}

struct Outline<'t> {
    tree: &'t Tree,
    seen: HashSet<&'t PersonId>,
    lines: Vec<String>,
}

impl<'t> Outline<'t> {
    /// `last` is `None` for top-level entries, otherwise whether this is the
    /// last child of its parents.
    fn family(&mut self, id: &PersonId, prefix: &str, last: Option<bool>) {
        let Some(person) = self.tree.person(id) else {
            return;
        };
        let branch = match last {
            None => "",
            Some(true) => "└── ",
            Some(false) => "├── ",
        };

        if !self.seen.insert(&person.id) {
            self.lines
                .push(format!("{prefix}{branch}{} (see above)", person.name));
            return;
        }

        let mut line = format!("{prefix}{branch}{} [{}]", person.name, person.id);

        let spouse = self
            .tree
            .spouse_of(&person.id)
            .filter(|spouse| self.seen.insert(&spouse.id));
        if let Some(spouse) = spouse {
            line.push_str(&format!(" + {} [{}]", spouse.name, spouse.id));
        }

        if last.is_none() && !person.sibling_ids.is_empty() {
            let names: Vec<&str> = person
                .sibling_ids
                .iter()
                .filter_map(|sibling| self.tree.person(sibling))
                .map(|sibling| sibling.name.as_str())
                .collect();
            line.push_str(&format!(" (siblings: {})", names.join(", ")));
        }
        self.lines.push(line);

        let mut children: Vec<&'t PersonId> = person.children.iter().collect();
        if let Some(spouse) = spouse {
            for child in &spouse.children {
                if !children.contains(&child) {
                    children.push(child);
                }
            }
        }

        let prefix = match last {
            None => String::new(),
            Some(true) => format!("{prefix}    "),
            Some(false) => format!("{prefix}│   "),
        };
        for (i, child) in children.iter().enumerate() {
            self.family(child, &prefix, Some(i + 1 == children.len()));
        }
    }
}

#[cfg(test)]
mod tests {
    use family_tree::Person;

    use super::*;

    fn person(id: &str, name: &str, children: &[&str], spouse: Option<&str>) -> Person {
        let mut person = Person::new(PersonId::from(id), name);
        person.children = children.iter().copied().map(PersonId::from).collect();
        person.spouse_id = spouse.map(PersonId::from);
        person
    }

    #[test]
    fn couples_and_children_are_nested() {
        let tree = Tree::from_parts(
            [
                person("a", "Alex", &["c", "r"], Some("j")),
                person("j", "Jamie", &["c", "r"], Some("a")),
                person("c", "Casey", &["k"], None),
                person("k", "Kit", &[], None),
                person("r", "Riley", &[], None),
            ],
            vec![PersonId::from("a")],
        );

        assert_eq!(
            outline(&tree),
            [
                "Alex [a] + Jamie [j]",
                "├── Casey [c]",
                "│   └── Kit [k]",
                "└── Riley [r]",
            ]
        );
    }

    #[test]
    fn shared_people_are_written_once() {
        let tree = Tree::from_parts(
            [
                person("p", "Pat", &["c"], None),
                person("q", "Quinn", &["c"], None),
                person("c", "Casey", &[], None),
            ],
            vec![PersonId::from("p"), PersonId::from("q")],
        );

        assert_eq!(
            outline(&tree),
            [
                "Pat [p]",
                "└── Casey [c]",
                "Quinn [q]",
                "└── Casey (see above)",
            ]
        );
    }

    #[test]
    fn root_siblings_are_named() {
        let mut sam = person("s", "Sam", &[], None);
        sam.sibling_ids = vec![PersonId::from("l")];
        let mut lee = person("l", "Lee", &[], None);
        lee.sibling_ids = vec![PersonId::from("s")];
        let tree = Tree::from_parts([sam, lee], vec![PersonId::from("s"), PersonId::from("l")]);

        assert_eq!(
            outline(&tree),
            ["Sam [s] (siblings: Lee)", "Lee [l] (siblings: Sam)"]
        );
    }
}
