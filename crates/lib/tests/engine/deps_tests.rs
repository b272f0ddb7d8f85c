//! Dependency discovery and generation order.

use std::collections::HashSet;

use tsuku_lib::action::Registry;
use tsuku_lib::deps::{DependencyError, DependencyResolver, RecipeDependencySource};

use super::common::{MemoryRecipes, linux};

fn neovim() -> MemoryRecipes {
  MemoryRecipes::default()
    .with_deps(
      "neovim",
      &["libuv", "luv", "luajit", "libvterm", "tree-sitter", "msgpack-c", "unibilium"],
    )
    .with_deps("luv", &["libuv", "luajit"])
    .with_deps("tree-sitter", &["utf8proc"])
    .with_deps("libuv", &[])
    .with_deps("luajit", &[])
    .with_deps("libvterm", &[])
    .with_deps("msgpack-c", &[])
    .with_deps("unibilium", &[])
    .with_deps("utf8proc", &[])
}

fn position(order: &[String], tool: &str) -> usize {
  order
    .iter()
    .position(|t| t == tool)
    .unwrap_or_else(|| panic!("{tool} missing from {order:?}"))
}

#[tokio::test]
async fn shared_leaf_is_generated_once_before_its_parents() {
  let recipes = neovim();
  let source = RecipeDependencySource::new(&recipes, Registry::builtin(), linux());
  let nothing_installed = |_: &str| false;
  let resolver = DependencyResolver::new(&source, &nothing_installed);

  let (tree, order) = resolver.resolve("neovim").await.unwrap();

  assert_eq!(tree.len(), 9);
  assert_eq!(order.len(), 9);
  assert_eq!(order.iter().filter(|t| *t == "libuv").count(), 1);
  assert!(position(&order, "libuv") < position(&order, "luv"));
  assert!(position(&order, "libuv") < position(&order, "neovim"));
  assert_eq!(order.last().map(String::as_str), Some("neovim"));

  let unique: HashSet<_> = order.iter().collect();
  assert_eq!(unique.len(), order.len());
}

#[tokio::test]
async fn every_edge_is_ordered_dependency_first() {
  let recipes = neovim();
  let source = RecipeDependencySource::new(&recipes, Registry::builtin(), linux());
  let nothing_installed = |_: &str| false;
  let resolver = DependencyResolver::new(&source, &nothing_installed);

  let (tree, order) = resolver.resolve("neovim").await.unwrap();

  for (dependent, dependency) in tree.edges() {
    assert!(
      position(&order, dependency) < position(&order, dependent),
      "{dependency} must precede {dependent} in {order:?}"
    );
  }
}

#[tokio::test]
async fn installed_tools_are_left_out_of_the_order() {
  let recipes = neovim();
  let source = RecipeDependencySource::new(&recipes, Registry::builtin(), linux());
  let installed = |tool: &str| matches!(tool, "libuv" | "luajit");
  let resolver = DependencyResolver::new(&source, &installed);

  let (tree, order) = resolver.resolve("neovim").await.unwrap();

  assert!(!order.contains(&"libuv".to_string()));
  assert!(!order.contains(&"luajit".to_string()));
  let summary = tree.summary();
  assert_eq!(summary.root, "neovim");
  assert_eq!(summary.satisfied, ["libuv", "luajit"]);
  assert_eq!(summary.generation_order, order);

  let rendered = tree.format_tree();
  assert!(rendered.starts_with("neovim (needs install)\n"), "{rendered}");
  assert!(rendered.contains("libuv (installed)"), "{rendered}");
  assert!(rendered.contains("libuv [duplicate]"), "{rendered}");
}

#[tokio::test]
async fn cycles_are_rejected_before_generation() {
  let recipes = MemoryRecipes::default()
    .with_deps("a", &["b"])
    .with_deps("b", &["c"])
    .with_deps("c", &["a"]);
  let source = RecipeDependencySource::new(&recipes, Registry::builtin(), linux());
  let nothing_installed = |_: &str| false;
  let resolver = DependencyResolver::new(&source, &nothing_installed);

  let err = resolver.resolve("a").await.unwrap_err();

  match err {
    DependencyError::Cycle { chain } => assert_eq!(chain, ["a", "b", "c", "a"]),
    other => panic!("unexpected error: {other}"),
  }
}

#[tokio::test]
async fn ecosystem_steps_pull_in_their_toolchain() {
  let recipes = MemoryRecipes::default()
    .with(
      "prettier",
      r#"
[metadata]
name = "prettier"

[[steps]]
action = "npm_install"
package = "prettier"
executables = ["prettier"]
"#,
    )
    .with_deps("nodejs", &[]);
  let source = RecipeDependencySource::new(&recipes, Registry::builtin(), linux());
  let nothing_installed = |_: &str| false;
  let resolver = DependencyResolver::new(&source, &nothing_installed);

  let (_, order) = resolver.resolve("prettier").await.unwrap();
  assert_eq!(order, ["nodejs", "prettier"]);
}
