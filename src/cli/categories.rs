use comfy_table::Cell;
use serde::Serialize;

use crate::client::ExpenseClient;
use crate::tree::{CategoryNode, Forest, build_forest_with};
use crate::types::CategoryId;

use super::render::{KeyValueRow, TableRow, render_output};
use super::{CategoriesCmd, Cli, OutputFormat};

pub(super) fn run_categories(
    cli: &Cli,
    client: &ExpenseClient,
    cmd: CategoriesCmd,
) -> anyhow::Result<()> {
    let sort = match &cmd {
        CategoriesCmd::List(args) => args.sort,
        CategoriesCmd::Tree { sort } => *sort,
        CategoriesCmd::Show { .. } | CategoriesCmd::Parents { .. } => Default::default(),
    };
    let forest = build_forest_with(&client.list_categories()?, sort.into());

    match cmd {
        CategoriesCmd::List(args) => {
            let mut rows = forest.iter().map(CategoryRow::from).collect::<Vec<_>>();
            if let Some(q) = args.name_contains.as_ref() {
                let q = q.to_lowercase();
                rows.retain(|c| c.name.to_lowercase().contains(&q));
            }
            report_issues(&forest);
            render_output(cli, rows)
        }
        CategoriesCmd::Tree { .. } => {
            report_issues(&forest);
            match cli.output {
                OutputFormat::Json => {
                    let entries = forest
                        .iter()
                        .map(|node| TreeEntry {
                            row: CategoryRow::from(node),
                            children: forest
                                .children(node)
                                .map(|ch| ch.category.id.clone())
                                .collect(),
                        })
                        .collect::<Vec<_>>();
                    println!("{}", serde_json::to_string_pretty(&entries)?);
                }
                OutputFormat::Table => print!("{}", render_tree(&forest)),
            }
            Ok(())
        }
        CategoriesCmd::Show { id } => {
            let Some(node) = forest.find(&id) else {
                anyhow::bail!("category not found");
            };
            let c = &node.category;
            let parent_name = c
                .parent_id
                .as_ref()
                .and_then(|p| forest.find(p))
                .map(|p| p.category.name.clone())
                .unwrap_or_default();
            render_output(
                cli,
                vec![
                    KeyValueRow::new("id", c.id.to_string()),
                    KeyValueRow::new("name", c.name.clone()),
                    KeyValueRow::new("description", c.description.clone().unwrap_or_default()),
                    KeyValueRow::new(
                        "parent_id",
                        c.parent_id
                            .as_ref()
                            .map(|p| p.to_string())
                            .unwrap_or_default(),
                    ),
                    KeyValueRow::new("parent", parent_name),
                    KeyValueRow::new("depth", node.depth.to_string()),
                    KeyValueRow::new(
                        "children",
                        forest
                            .children(node)
                            .map(|ch| ch.category.name.as_str())
                            .collect::<Vec<_>>()
                            .join(", "),
                    ),
                ],
            )
        }
        CategoriesCmd::Parents { id } => {
            if forest.find(&id).is_none() {
                anyhow::bail!("category not found");
            }
            let rows = forest
                .valid_parents(&id)
                .into_iter()
                .filter_map(|c| forest.find(&c.id))
                .map(CategoryRow::from)
                .collect::<Vec<_>>();
            render_output(cli, rows)
        }
    }
}

fn report_issues(forest: &Forest) {
    for issue in &forest.issues {
        eprintln!("warning: {issue}");
    }
}

/// Two spaces per level, `name (id)` per line.
fn render_tree(forest: &Forest) -> String {
    let mut out = String::new();
    forest.walk(|node| {
        out.push_str(&"  ".repeat(node.depth));
        out.push_str(&format!("{} ({})\n", node.category.name, node.category.id));
    });
    out
}

#[derive(Debug, Clone, Serialize)]
struct CategoryRow {
    id: CategoryId,
    name: String,
    parent_id: Option<CategoryId>,
    depth: usize,
}

/// Tree order; the hierarchy is carried by child ids rather than nesting.
#[derive(Debug, Serialize)]
struct TreeEntry {
    #[serde(flatten)]
    row: CategoryRow,
    children: Vec<CategoryId>,
}

impl From<&CategoryNode> for CategoryRow {
    fn from(node: &CategoryNode) -> Self {
        Self {
            id: node.category.id.clone(),
            name: node.category.name.clone(),
            parent_id: node.category.parent_id.clone(),
            depth: node.depth,
        }
    }
}

impl TableRow for CategoryRow {
    const HEADERS: &'static [&'static str] = &["id", "name", "parent_id", "depth"];

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::new(self.id.as_str()),
            Cell::new(format!("{}{}", "  ".repeat(self.depth), self.name)),
            Cell::new(
                self.parent_id
                    .as_ref()
                    .map(|p| p.to_string())
                    .unwrap_or_default(),
            ),
            Cell::new(self.depth),
        ]
    }
}
