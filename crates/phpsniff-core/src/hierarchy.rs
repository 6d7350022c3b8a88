//! Class hierarchy lookup and test-class detection
//!
//! The engine never loads code itself. It asks a [`TypeRegistry`] for the
//! ancestors and interfaces of the class declared in the file, and keeps
//! the answer (including "unknown") for the rest of the pass.

use std::collections::{BTreeSet, HashMap, VecDeque};

use tracing::{debug, warn};

use crate::context::{RuleContext, Scope};
use crate::error::ContractResult;
use crate::token::TokenKind;

/// Knows about type definitions available to the host
pub trait TypeRegistry {
    /// Ancestor classes and implemented interfaces of a fully qualified
    /// type name, or `None` when the type is not known
    fn resolve(&self, qualified_name: &str) -> Option<BTreeSet<String>>;
}

/// Registry that knows no types
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTypeRegistry;

impl TypeRegistry for NoTypeRegistry {
    fn resolve(&self, _qualified_name: &str) -> Option<BTreeSet<String>> {
        None
    }
}

#[derive(Debug, Clone)]
struct TypeDecl {
    name: String,
    parent: Option<String>,
    interfaces: Vec<String>,
}

/// In-memory registry of declared types
///
/// Lookups are case-insensitive (PHP class names are); names come back as
/// they were declared.
#[derive(Debug, Clone, Default)]
pub struct StaticTypeRegistry {
    types: HashMap<String, TypeDecl>,
}

impl StaticTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a class (with its parent) or an interface (with the
    /// interfaces it extends)
    pub fn declare(&mut self, name: &str, parent: Option<&str>, interfaces: &[&str]) -> &mut Self {
        let name = normalize(name);
        self.types.insert(
            name.to_lowercase(),
            TypeDecl {
                name: name.to_string(),
                parent: parent.map(|p| normalize(p).to_string()),
                interfaces: interfaces.iter().map(|i| normalize(i).to_string()).collect(),
            },
        );
        self
    }

    pub fn with_type(mut self, name: &str, parent: Option<&str>, interfaces: &[&str]) -> Self {
        self.declare(name, parent, interfaces);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(&normalize(name).to_lowercase())
    }
}

impl TypeRegistry for StaticTypeRegistry {
    fn resolve(&self, qualified_name: &str) -> Option<BTreeSet<String>> {
        let root = self.types.get(&normalize(qualified_name).to_lowercase())?;

        let mut found = BTreeSet::new();
        let mut seen: BTreeSet<String> = BTreeSet::new();
        seen.insert(root.name.to_lowercase());

        let mut queue: VecDeque<&TypeDecl> = VecDeque::from([root]);
        while let Some(decl) = queue.pop_front() {
            for related in decl.parent.iter().chain(decl.interfaces.iter()) {
                // Cycles in bad declarations stop here
                if !seen.insert(related.to_lowercase()) {
                    continue;
                }
                found.insert(related.clone());
                if let Some(next) = self.types.get(&related.to_lowercase()) {
                    queue.push_back(next);
                }
            }
        }

        Some(found)
    }
}

fn normalize(name: &str) -> &str {
    name.trim_start_matches('\\')
}

/// Base classes that mark a class as a test case
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestFramework {
    base_classes: BTreeSet<String>,
}

impl Default for TestFramework {
    /// PHPUnit, before and after namespacing
    fn default() -> Self {
        Self::new(["PHPUnit_Framework_TestCase", "PHPUnit\\Framework\\TestCase"])
    }
}

impl TestFramework {
    pub fn new<I, S>(base_classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            base_classes: base_classes
                .into_iter()
                .map(|name| normalize(name.as_ref()).to_string())
                .collect(),
        }
    }

    pub fn base_classes(&self) -> impl Iterator<Item = &str> {
        self.base_classes.iter().map(String::as_str)
    }

    pub fn is_base_class(&self, name: &str) -> bool {
        self.base_classes.contains(normalize(name))
    }
}

/// Outcome of looking up the file's class
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) enum Hierarchy {
    #[default]
    NotComputed,
    Unavailable,
    Resolved(BTreeSet<String>),
}

/// Per-file memo tables
#[derive(Debug, Default)]
pub(crate) struct ClassHierarchyCache {
    hierarchy: Hierarchy,
    test_classes: HashMap<usize, bool>,
    test_methods: HashMap<usize, bool>,
}

impl RuleContext<'_> {
    /// Ancestors and interfaces of the first class or interface declared in
    /// the file, or `None` when the registry does not know it
    ///
    /// Computed once per file. The first failed lookup reports an
    /// `Internal.NeedClassLoader` warning at `pos` explaining `reason`.
    pub fn class_parents_and_interfaces(
        &mut self,
        pos: usize,
        reason: &str,
    ) -> ContractResult<Option<&BTreeSet<String>>> {
        self.resolve_hierarchy(pos, reason)?;
        match &self.hierarchy.hierarchy {
            Hierarchy::Resolved(names) => Ok(Some(names)),
            _ => Ok(None),
        }
    }

    /// Whether the file's class extends one of the test framework's base
    /// classes; memoized per position
    pub fn is_test_class(&mut self, pos: usize) -> ContractResult<bool> {
        if let Some(&cached) = self.hierarchy.test_classes.get(&pos) {
            return Ok(cached);
        }

        self.resolve_hierarchy(pos, "check for a test class")?;
        let is_test = match &self.hierarchy.hierarchy {
            Hierarchy::Resolved(names) => names
                .iter()
                .any(|n| self.test_framework.is_base_class(n)),
            _ => false,
        };

        self.hierarchy.test_classes.insert(pos, is_test);
        Ok(is_test)
    }

    /// Whether the function at `pos` is a test method: public, concrete,
    /// named `test*` and declared in a test class; memoized per position
    pub fn is_test_method(&mut self, pos: usize) -> ContractResult<bool> {
        if let Some(&cached) = self.hierarchy.test_methods.get(&pos) {
            return Ok(cached);
        }

        let mut is_test = false;
        if self.is_test_class(pos)? {
            let props = self.method_properties(pos)?;
            if props.scope == Scope::Public && !props.is_abstract && !props.is_closure {
                is_test = self.declaration_name(pos)?.is_some_and(|name| {
                    name.get(..4)
                        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("test"))
                });
            }
        }

        self.hierarchy.test_methods.insert(pos, is_test);
        Ok(is_test)
    }

    fn resolve_hierarchy(&mut self, pos: usize, reason: &str) -> ContractResult<()> {
        if self.hierarchy.hierarchy != Hierarchy::NotComputed {
            return Ok(());
        }
        self.hierarchy.hierarchy = Hierarchy::Unavailable;

        let Some(class) = self.declared_class_name()? else {
            return Ok(());
        };

        match self.registry.resolve(&class) {
            Some(names) => {
                debug!(class = %class, related = names.len(), "resolved class hierarchy");
                self.hierarchy.hierarchy = Hierarchy::Resolved(names);
            }
            None => {
                warn!(class = %class, reason, "class hierarchy unavailable");
                let message = format!("Need class loader to {}", reason);
                self.add_warning(pos, "Internal.NeedClassLoader", message)?;
            }
        }

        Ok(())
    }

    /// Namespace-qualified name of the first named class or interface;
    /// anonymous classes are skipped
    fn declared_class_name(&self) -> ContractResult<Option<String>> {
        let mut name = String::new();
        let mut search_from = 0;

        if let Some(ns) = self.find_next(&[TokenKind::Namespace], 0, None, false)? {
            let terminators = [TokenKind::Semicolon, TokenKind::OpenCurlyBracket];
            let end = self
                .find_next(&terminators, ns + 1, None, false)?
                .unwrap_or(self.len());
            for token in &self.tokens()[ns + 1..end] {
                if !token.kind.is_empty() {
                    name.push_str(&token.content);
                }
            }
            // `namespace { ... }` is the global namespace
            if !name.is_empty() {
                name.push('\\');
            }
            search_from = end;
        }

        let declarations = [TokenKind::Class, TokenKind::Interface];
        while let Some(class) = self.find_next(&declarations, search_from, None, false)? {
            if let Some(declared) = self.declaration_name(class)? {
                name.push_str(&declared);
                return Ok(Some(name));
            }
            search_from = class + 1;
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::FixtureTokenizer;
    use crate::runner::Tokenizer;
    use std::cell::Cell;

    struct CountingRegistry {
        inner: StaticTypeRegistry,
        calls: Cell<usize>,
    }

    impl TypeRegistry for CountingRegistry {
        fn resolve(&self, qualified_name: &str) -> Option<BTreeSet<String>> {
            self.calls.set(self.calls.get() + 1);
            self.inner.resolve(qualified_name)
        }
    }

    fn phpunit() -> StaticTypeRegistry {
        StaticTypeRegistry::new()
            .with_type(
                "PHPUnit\\Framework\\TestCase",
                Some("PHPUnit\\Framework\\Assert"),
                &["PHPUnit\\Framework\\Test"],
            )
            .with_type("PHPUnit\\Framework\\Assert", None, &[])
            .with_type("PHPUnit\\Framework\\Test", None, &["Countable"])
    }

    const TEST_FILE: &str = "<?php
namespace App\\Tests;

class WidgetTest extends BaseTest
{
    public function testRenders() {}
    protected function testHidden() {}
    abstract public function testAbstract();
    public function TestUpperCase() {}
    public function helper() {}
    public function run() { $f = function () {}; }
}
";

    fn functions(ctx: &RuleContext<'_>) -> Vec<usize> {
        ctx.tokens()
            .iter()
            .enumerate()
            .filter(|(_, t)| matches!(t.kind, TokenKind::Function | TokenKind::Closure))
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn test_static_registry_resolves_transitively() {
        let registry = phpunit().with_type(
            "App\\Tests\\BaseTest",
            Some("\\PHPUnit\\Framework\\TestCase"),
            &[],
        );
        let names = registry.resolve("\\app\\tests\\basetest").unwrap();

        let expected: BTreeSet<String> = [
            "PHPUnit\\Framework\\TestCase",
            "PHPUnit\\Framework\\Assert",
            "PHPUnit\\Framework\\Test",
            "Countable",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        assert_eq!(names, expected);
        assert!(registry.resolve("Unknown").is_none());
    }

    #[test]
    fn test_static_registry_survives_cycles() {
        let registry = StaticTypeRegistry::new()
            .with_type("A", Some("B"), &[])
            .with_type("B", Some("A"), &[]);
        let names = registry.resolve("A").unwrap();
        assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["B".to_string()]);
    }

    #[test]
    fn test_resolves_namespaced_class_once() {
        let registry = CountingRegistry {
            inner: phpunit().with_type("App\\Tests\\WidgetTest", Some("App\\Tests\\BaseTest"), &[])
                .with_type("App\\Tests\\BaseTest", Some("PHPUnit\\Framework\\TestCase"), &[]),
            calls: Cell::new(0),
        };
        let stream = FixtureTokenizer.tokenize(TEST_FILE).unwrap();
        let mut ctx = RuleContext::new(stream).with_type_registry(&registry);

        let names = ctx.class_parents_and_interfaces(0, "test").unwrap().cloned().unwrap();
        assert!(names.contains("App\\Tests\\BaseTest"));
        assert!(names.contains("PHPUnit\\Framework\\TestCase"));

        let fns = functions(&ctx);
        assert!(ctx.is_test_class(fns[0]).unwrap());
        assert!(ctx.is_test_class(fns[1]).unwrap());
        assert_eq!(registry.calls.get(), 1);
        assert!(ctx.reporter().violations().is_empty());
    }

    #[test]
    fn test_test_method_rules() {
        let registry = phpunit()
            .with_type("App\\Tests\\WidgetTest", Some("App\\Tests\\BaseTest"), &[])
            .with_type("App\\Tests\\BaseTest", Some("PHPUnit\\Framework\\TestCase"), &[]);
        let stream = FixtureTokenizer.tokenize(TEST_FILE).unwrap();
        let mut ctx = RuleContext::new(stream).with_type_registry(&registry);

        let fns = functions(&ctx);
        let results: Vec<bool> = fns.iter().map(|&f| ctx.is_test_method(f).unwrap()).collect();

        // testRenders, testHidden, testAbstract, TestUpperCase, helper, run, closure
        assert_eq!(results, vec![true, false, false, true, false, false, false]);
    }

    #[test]
    fn test_unresolvable_class_warns_once() {
        let stream = FixtureTokenizer.tokenize(TEST_FILE).unwrap();
        let mut ctx = RuleContext::new(stream);
        let fns = functions(&ctx);

        assert!(!ctx.is_test_class(fns[0]).unwrap());
        assert!(!ctx.is_test_method(fns[0]).unwrap());
        assert!(!ctx.is_test_method(fns[3]).unwrap());

        let warnings = ctx.reporter().violations();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, "Internal.NeedClassLoader");
        assert_eq!(warnings[0].message, "Need class loader to check for a test class");
        assert_eq!(warnings[0].position, fns[0]);
    }

    #[test]
    fn test_anonymous_class_before_declaration_is_skipped() {
        let source = "<?php
namespace App\\Tests;

$fake = new class {};

class WidgetTest extends BaseTest
{
    public function testRenders() {}
}
";
        let registry = phpunit()
            .with_type("App\\Tests\\WidgetTest", Some("PHPUnit\\Framework\\TestCase"), &[]);
        let stream = FixtureTokenizer.tokenize(source).unwrap();
        let mut ctx = RuleContext::new(stream).with_type_registry(&registry);
        let fns = functions(&ctx);

        assert!(ctx.is_test_method(fns[0]).unwrap());
        assert!(ctx.reporter().violations().is_empty());
    }

    #[test]
    fn test_only_anonymous_classes_is_unavailable() {
        let stream = FixtureTokenizer
            .tokenize("<?php\n$a = new class {};\n$b = new class {};\n")
            .unwrap();
        let mut ctx = RuleContext::new(stream);

        assert!(ctx.class_parents_and_interfaces(0, "test").unwrap().is_none());
        assert!(ctx.reporter().violations().is_empty());
    }

    #[test]
    fn test_hierarchy_without_test_base() {
        let registry = StaticTypeRegistry::new().with_type(
            "App\\Tests\\WidgetTest",
            Some("App\\Tests\\BaseTest"),
            &["JsonSerializable"],
        );
        let stream = FixtureTokenizer.tokenize(TEST_FILE).unwrap();
        let mut ctx = RuleContext::new(stream).with_type_registry(&registry);
        let fns = functions(&ctx);

        assert!(!ctx.is_test_class(fns[0]).unwrap());
        assert!(!ctx.is_test_method(fns[0]).unwrap());
    }

    #[test]
    fn test_custom_framework() {
        let registry = StaticTypeRegistry::new()
            .with_type("App\\Tests\\WidgetTest", Some("Codeception\\Test\\Unit"), &[]);
        let stream = FixtureTokenizer.tokenize(TEST_FILE).unwrap();
        let mut ctx = RuleContext::new(stream)
            .with_type_registry(&registry)
            .with_test_framework(TestFramework::new(["\\Codeception\\Test\\Unit"]));
        let fns = functions(&ctx);

        assert!(ctx.is_test_method(fns[0]).unwrap());
    }

    #[test]
    fn test_file_without_class() {
        let stream = FixtureTokenizer.tokenize("<?php\nfunction testFoo() {}\n").unwrap();
        let mut ctx = RuleContext::new(stream).with_type_registry(&NoTypeRegistry);
        assert_eq!(ctx.class_parents_and_interfaces(1, "check").unwrap(), None);
        assert!(ctx.reporter().violations().is_empty());
    }
}
