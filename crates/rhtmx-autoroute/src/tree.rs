// File: src/tree.rs
// Purpose: Diagnostic rendering of the route table as a tree

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::{RouteDefinition, RouteTable};

#[derive(Default)]
struct Node<'a> {
    routes: Vec<&'a RouteDefinition>,
    children: BTreeMap<&'a str, Node<'a>>,
}

enum Item<'a> {
    Route(&'a RouteDefinition),
    Child(&'a str, &'a Node<'a>),
}

/// Renders the table as an indented tree of URL segments
///
/// ```text
/// /
/// ├── GET /
/// └── users
///     ├── GET /users [1 middleware]
///     └── list
///         └── GET /users/list [2 middleware] (admin)
/// ```
pub fn render(table: &RouteTable) -> String {
    let mut root = Node::default();

    for def in table.values() {
        let mut node = &mut root;
        for segment in def.route_path.split('/').filter(|s| !s.is_empty()) {
            node = node.children.entry(segment).or_default();
        }
        node.routes.push(def);
    }

    let mut out = String::from("/\n");
    render_node(&root, "", &mut out);
    out
}

fn render_node(node: &Node<'_>, prefix: &str, out: &mut String) {
    let mut routes = node.routes.clone();
    routes.sort_by_key(|def| def.method);

    let items: Vec<Item<'_>> = routes
        .into_iter()
        .map(Item::Route)
        .chain(node.children.iter().map(|(name, child)| Item::Child(*name, child)))
        .collect();

    let count = items.len();
    for (index, item) in items.into_iter().enumerate() {
        let last = index + 1 == count;
        let branch = if last { "└── " } else { "├── " };

        match item {
            Item::Route(def) => {
                let _ = writeln!(out, "{}{}{}", prefix, branch, describe(def));
            }
            Item::Child(name, child) => {
                let _ = writeln!(out, "{}{}{}", prefix, branch, name);
                let nested = format!("{}{}", prefix, if last { "    " } else { "│   " });
                render_node(child, &nested, out);
            }
        }
    }
}

fn describe(def: &RouteDefinition) -> String {
    let mut line = format!("{} {}", def.method, def.route_path);

    if !def.middleware.is_empty() {
        let _ = write!(line, " [{} middleware]", def.middleware.len());
    }
    if let Some(group) = &def.group {
        let _ = write!(line, " ({})", group);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HttpMethod;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_tree() {
        let mut table = RouteTable::new();
        table.extend([
            RouteDefinition::new("/", HttpMethod::Get, "/r/index.get.rs"),
            RouteDefinition::new("/users/list", HttpMethod::Get, "/r/users/list.get.rs")
                .with_middleware(["/r/users/middleware.rs"]),
            RouteDefinition::new("/users/create", HttpMethod::Post, "/r/users/create.post.rs"),
        ]);

        let expected = "\
/
├── GET /
└── users
    ├── create
    │   └── POST /users/create
    └── list
        └── GET /users/list [1 middleware]
";
        assert_eq!(render(&table), expected);
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render(&RouteTable::new()), "/\n");
    }
}
