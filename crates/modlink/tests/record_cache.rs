//! Integration tests for the shared record cache across sessions

use modlink::ast::{DeclarationKind, TypeDefinition};
use modlink::{ModuleConfig, ModuleParser, ModuleRecordCache, ModuleSession, ModuleSource, ModuleUri, OutlineParser};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn write(root: &Path, name: &str, content: &str) {
    let path = root.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn uri(root: &Path, name: &str) -> ModuleUri {
    ModuleUri::from_file_path(&root.join(name)).unwrap()
}

/// A -> B -> C plus D -> C
fn chain_project() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let root = dir.path().canonicalize().unwrap();
    write(&root, "a.ol", "from .b import B\ntype A: B\n");
    write(&root, "b.ol", "from .c import C\ntype B: C\n");
    write(&root, "c.ol", "type C: int\n");
    write(&root, "d.ol", "from .c import C\ntype D: C\n");
    (dir, root)
}

#[test]
fn test_remove_root_cascades_through_chain() {
    let (_dir, root) = chain_project();
    let cache = ModuleRecordCache::new();
    let session = ModuleSession::with_cache(ModuleConfig::new(&root), OutlineParser::new(), &cache);

    session.load_path(&root.join("a.ol")).unwrap();
    assert_eq!(cache.len(), 3);

    let evicted = cache.remove(&uri(&root, "a.ol"));
    assert_eq!(evicted.len(), 3);
    assert!(cache.is_empty());
    assert!(cache.check_consistency());
}

#[test]
fn test_shared_dependency_survives_removal() {
    let (_dir, root) = chain_project();
    let cache = ModuleRecordCache::new();
    let session = ModuleSession::with_cache(ModuleConfig::new(&root), OutlineParser::new(), &cache);

    session.load_path(&root.join("a.ol")).unwrap();
    session.load_path(&root.join("d.ol")).unwrap();
    assert_eq!(cache.len(), 4);
    assert_eq!(cache.dependents(&uri(&root, "c.ol")).len(), 2);

    cache.remove(&uri(&root, "a.ol"));
    assert!(!cache.contains(&uri(&root, "a.ol")));
    assert!(!cache.contains(&uri(&root, "b.ol")));
    assert!(cache.contains(&uri(&root, "c.ol")));
    assert!(cache.contains(&uri(&root, "d.ol")));
    assert_eq!(cache.dependents(&uri(&root, "c.ol")), vec![uri(&root, "d.ol")]);
    assert!(cache.check_consistency());
}

#[test]
fn test_second_session_reuses_records() {
    let (_dir, root) = chain_project();
    let cache = ModuleRecordCache::new();

    let first = ModuleSession::with_cache(ModuleConfig::new(&root), OutlineParser::new(), &cache)
        .load_path(&root.join("a.ol"))
        .unwrap();
    let second = ModuleSession::with_cache(ModuleConfig::new(&root), OutlineParser::new(), &cache)
        .load_path(&root.join("d.ol"))
        .unwrap();

    let c = uri(&root, "c.ol");
    assert!(Arc::ptr_eq(first.module(&c).unwrap(), second.module(&c).unwrap()));
    assert!(cache.stats().hits >= 1);
}

#[test]
fn test_resolving_cached_graph_is_idempotent() {
    let (_dir, root) = chain_project();
    let cache = ModuleRecordCache::new();
    let session = ModuleSession::with_cache(ModuleConfig::new(&root), OutlineParser::new(), &cache);

    let first = session.load_path(&root.join("a.ol")).unwrap();
    assert_eq!(first.report().imports, 2);
    assert_eq!(first.report().links, 2);

    let again = session.load_path(&root.join("a.ol")).unwrap();
    assert!(again.report().is_empty());
    assert_eq!(cache.len(), 3);
    assert!(cache.check_consistency());
}

#[test]
fn test_invalidate_reloads_changed_module() {
    let (_dir, root) = chain_project();
    let cache = ModuleRecordCache::new();
    let session = ModuleSession::with_cache(ModuleConfig::new(&root), OutlineParser::new(), &cache);

    session.load_path(&root.join("a.ol")).unwrap();
    session.load_path(&root.join("d.ol")).unwrap();

    write(&root, "c.ol", "type C: string\ntype Extra: int\n");
    let evicted = cache.invalidate(&uri(&root, "c.ol"));
    assert_eq!(evicted.len(), 4);
    assert!(cache.is_empty());

    let reloaded = session.load_path(&root.join("d.ol")).unwrap();
    let c = reloaded.module(&uri(&root, "c.ol")).unwrap();
    assert!(c.symbols().contains("Extra"));
}

#[test]
fn test_concurrent_sessions_share_cache() {
    let (_dir, root) = chain_project();
    let cache = Arc::new(ModuleRecordCache::new());

    let handles: Vec<_> = ["a.ol", "d.ol", "b.ol", "a.ol"]
        .into_iter()
        .map(|name| {
            let cache = Arc::clone(&cache);
            let root = root.clone();
            std::thread::spawn(move || {
                let session = ModuleSession::with_cache(ModuleConfig::new(&root), OutlineParser::new(), &*cache);
                session.load_path(&root.join(name)).unwrap().len()
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap() >= 2);
    }

    assert_eq!(cache.len(), 4);
    assert!(cache.check_consistency());
}

#[test]
fn test_reload_after_dependency_removed() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().canonicalize().unwrap();
    write(&root, "types.ol", "type Item: int\ntype Order { item: Item }\n");
    write(&root, "main.ol", "from .types import Order\ntype Use: Order\n");

    let cache = ModuleRecordCache::new();
    let session = ModuleSession::with_cache(ModuleConfig::new(&root), OutlineParser::new(), &cache);
    drop(session.load_path(&root.join("main.ol")).unwrap());

    let types = uri(&root, "types.ol");
    assert_eq!(cache.remove(&types), vec![types.clone()]);
    assert!(cache.contains(&uri(&root, "main.ol")));

    let program = session.load_path(&root.join("main.ol")).unwrap();
    let order = program.module(&types).unwrap().program().declaration("Order").unwrap().clone();
    let imported = program
        .symbol_table(&uri(&root, "main.ol"))
        .unwrap()
        .get("Order")
        .unwrap()
        .declaration()
        .cloned()
        .unwrap();
    assert!(Arc::ptr_eq(&imported, &order));

    let DeclarationKind::Type(TypeDefinition::Inline { fields, .. }) = &order.kind else {
        panic!("expected an inline type");
    };
    let TypeDefinition::Link(item) = &fields[0].ty else {
        panic!("expected a type link");
    };
    assert!(item.is_resolved());
    assert_eq!(item.target().unwrap().name, "Item");
    assert!(cache.check_consistency());
}

#[test]
fn test_replaced_dependency_relinks_cached_dependents() {
    let (_dir, root) = chain_project();
    let cache = ModuleRecordCache::new();
    let session = ModuleSession::with_cache(ModuleConfig::new(&root), OutlineParser::new(), &cache);
    let first = session.load_path(&root.join("a.ol")).unwrap();

    // Another loader publishes a fresh record for c.ol
    let c = uri(&root, "c.ol");
    let fresh = OutlineParser::new()
        .parse_module(&ModuleSource::file(&root.join("c.ol")).unwrap())
        .unwrap();
    cache.insert(Arc::new(fresh), []);
    let fresh = cache.get(&c).unwrap();

    let second = session.load_path(&root.join("a.ol")).unwrap();
    assert!(Arc::ptr_eq(second.module(&c).unwrap(), &fresh));

    let b = uri(&root, "b.ol");
    assert!(!Arc::ptr_eq(first.module(&b).unwrap(), second.module(&b).unwrap()));
    let linked = second.symbol_table(&b).unwrap().get("C").unwrap().declaration().cloned().unwrap();
    assert!(Arc::ptr_eq(&linked, fresh.program().declaration("C").unwrap()));

    let a = second.root().program().declaration("A").unwrap().clone();
    let DeclarationKind::Type(TypeDefinition::Link(link)) = &a.kind else {
        panic!("expected a type link");
    };
    assert!(Arc::ptr_eq(&link.target().unwrap(), second.module(&b).unwrap().program().declaration("B").unwrap()));
    assert_eq!(second.report().imports, 2);
    assert!(cache.check_consistency());
}
