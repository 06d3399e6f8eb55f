use super::*;
use bindplan_model::DeclarationModel;

fn key(text: &str) -> TypeKey {
    text.parse().unwrap()
}

fn model(json: &str) -> DeclarationModel {
    DeclarationModel::from_json(json).unwrap()
}

/// Build the table for the first graph and open a context level for it.
fn open<'a>(
    model: &DeclarationModel,
    classes: &'a ClassIndex,
) -> (BindingTable<'a>, Vec<BindingError>, ParentContext) {
    let graph = &model.graphs[0];
    let (table, errors) = BindingTable::build(graph, classes);
    let mut ctx = ParentContext::new();
    let declared: Vec<TypeKey> = table.declared_keys().cloned().collect();
    ctx.push(&graph.name, graph.scopes.clone(), declared);
    (table, errors, ctx)
}

const ALIASES: &str = r#"{
  "graphs": [{
    "name": "AppGraph",
    "bindings": [
      { "key": { "type": "A1" }, "kind": { "binds": { "target": { "type": "A2" } } } },
      { "key": { "type": "A2" }, "kind": { "binds": { "target": { "type": "A3" } } } },
      { "key": { "type": "A3" }, "kind": { "binds": { "target": { "type": "A4" } } } },
      { "key": { "type": "A4" }, "kind": { "binds": { "target": { "type": "A5" } } } },
      { "key": { "type": "A5" }, "kind": { "binds": { "target": { "type": "Impl" } } } },
      { "key": { "type": "Impl" }, "kind": { "provides": { "factory": "Module.impl" } } },
      { "key": { "type": "X" }, "kind": { "binds": { "target": { "type": "Y" } } } },
      { "key": { "type": "Y" }, "kind": { "binds": { "target": { "type": "X" } } } }
    ]
  }]
}"#;

#[test]
fn test_alias_chain_resolves_to_terminal() {
    let model = model(ALIASES);
    let classes = ClassIndex::default();
    let (mut table, errors, mut ctx) = open(&model, &classes);
    assert!(errors.is_empty());

    let set = table
        .resolve(&ContextualTypeKey::direct(key("A1")), &mut ctx)
        .unwrap();
    let terminal = set.binding();
    assert_eq!(terminal.key(), &key("Impl"));
    assert!(matches!(terminal.as_ref(), Binding::Provided(_)));

    // The canonical binding of the head is still the alias.
    let head = table.binding_for(&key("A1"), false, &mut ctx).unwrap();
    assert!(head.is_alias());
    assert_eq!(head.dependencies().len(), 1);
}

#[test]
fn test_alias_cycle_is_fatal() {
    let model = model(ALIASES);
    let classes = ClassIndex::default();
    let (mut table, _, mut ctx) = open(&model, &classes);

    let err = table
        .resolve(&ContextualTypeKey::direct(key("X")), &mut ctx)
        .unwrap_err();
    match err {
        BindingErrorKind::AliasCycle { key: head, chain } => {
            assert_eq!(head, key("X"));
            assert_eq!(chain, vec![key("X"), key("Y"), key("X")]);
        }
        other => panic!("expected alias cycle, got {other:?}"),
    }
}

#[test]
fn test_resolution_is_memoized() {
    let model = model(ALIASES);
    let classes = ClassIndex::default();
    let (mut table, _, mut ctx) = open(&model, &classes);

    let request = ContextualTypeKey::direct(key("A3"));
    let first = table.resolve(&request, &mut ctx).unwrap();
    let second = table.resolve(&request, &mut ctx).unwrap();
    assert!(Arc::ptr_eq(first.binding(), second.binding()));
}

const MULTIBINDINGS: &str = r#"{
  "graphs": [{
    "name": "AppGraph",
    "bindings": [
      { "key": { "type": "Plugin" }, "kind": "intoSet", "origin": "LoggingModule.plugin" },
      { "key": { "type": "Plugin" }, "kind": "intoSet", "origin": "MetricsModule.plugin",
        "dependencies": [ { "type": "Clock" } ] },
      { "key": { "type": "Handler" }, "kind": { "intoMap": { "mapKey": { "type": "String", "value": "get" } } },
        "origin": "Routes.get" },
      { "key": { "type": "Handler" }, "kind": { "intoMap": { "mapKey": { "type": "String", "value": "get" } } },
        "origin": "Routes.getAgain" },
      { "key": { "type": "Set<Listener>" }, "kind": { "multibinds": {} } },
      { "key": { "type": "Set<Hook>" }, "kind": { "multibinds": { "allowEmpty": true } } }
    ]
  }]
}"#;

#[test]
fn test_set_contributors_in_declaration_order() {
    let model = model(MULTIBINDINGS);
    let classes = ClassIndex::default();
    let (mut table, _, mut ctx) = open(&model, &classes);

    let set = table
        .resolve(&ContextualTypeKey::direct(key("Set<Plugin>")), &mut ctx)
        .unwrap();
    let contributors = set.contributors();
    assert_eq!(contributors.len(), 2);
    let factories: Vec<&str> = contributors
        .iter()
        .map(|b| match b.as_ref() {
            Binding::Provided(p) => p.factory.as_str(),
            other => panic!("unexpected contributor {other}"),
        })
        .collect();
    assert_eq!(factories, vec!["LoggingModule.plugin", "MetricsModule.plugin"]);
    assert_ne!(contributors[0].key(), contributors[1].key());

    let Binding::Multibinding(multi) = set.binding().as_ref() else {
        panic!("expected a multibinding");
    };
    assert_eq!(multi.kind, MultibindingKind::Set);
    assert_eq!(multi.dependencies.len(), 2);
    assert!(table.is_contributor(&multi.contributors[0].key));
    assert!(!table.declared_keys().any(|k| table.is_contributor(k)));
}

#[test]
fn test_duplicate_map_key_is_fatal() {
    let model = model(MULTIBINDINGS);
    let classes = ClassIndex::default();
    let (mut table, errors, mut ctx) = open(&model, &classes);

    assert_eq!(errors.len(), 1);
    match &errors[0].kind {
        BindingErrorKind::DuplicateMapKey { key: agg, map_key, origins } => {
            assert_eq!(agg, &key("Map<String, Handler>"));
            assert_eq!(map_key, "get");
            assert_eq!(origins, &vec!["Routes.get".to_string(), "Routes.getAgain".to_string()]);
        }
        other => panic!("unexpected error {other:?}"),
    }

    // The first entry survives.
    let map = table
        .resolve(&ContextualTypeKey::direct(key("Map<String, Handler>")), &mut ctx)
        .unwrap();
    assert_eq!(map.contributors().len(), 1);
}

#[test]
fn test_declared_multibindings() {
    let model = model(MULTIBINDINGS);
    let classes = ClassIndex::default();
    let (mut table, _, mut ctx) = open(&model, &classes);

    let empty = table.binding_for(&key("Set<Listener>"), false, &mut ctx);
    assert_eq!(
        empty.unwrap_err(),
        BindingErrorKind::EmptyMultibinding { key: key("Set<Listener>") }
    );

    let hooks = table
        .resolve(&ContextualTypeKey::direct(key("Set<Hook>")), &mut ctx)
        .unwrap();
    assert!(hooks.contributors().is_empty());
}

#[test]
fn test_duplicate_binding_is_fatal() {
    let model = model(
        r#"{ "graphs": [{ "name": "G", "bindings": [
            { "key": { "type": "Api" }, "kind": { "provides": { "factory": "a" } }, "origin": "A.api" },
            { "key": { "type": "Api" }, "kind": { "provides": { "factory": "b" } }, "origin": "B.api" }
        ] }] }"#,
    );
    let classes = ClassIndex::default();
    let (_, errors, _) = open(&model, &classes);
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].kind,
        BindingErrorKind::Duplicate {
            key: key("Api"),
            graph: "G".to_string(),
            origins: vec!["A.api".to_string(), "B.api".to_string()],
        }
    );
}

const CLASSES: &str = r#"{
  "classes": [
    { "type": "Repo", "typeParameters": ["T"],
      "kind": { "injectable": { "parameters": [ { "type": "Dao<T>" }, { "type": "Clock", "wrapping": "lazy" } ] } } },
    { "type": "Dao", "typeParameters": ["T"], "kind": { "injectable": {} } },
    { "type": "Clock", "kind": "object" },
    { "type": "Cache", "scope": "AppScope", "kind": { "injectable": {} } },
    { "type": "Session", "scope": "UserScope", "kind": { "injectable": {} } }
  ],
  "graphs": [{ "name": "AppGraph", "scopes": ["AppScope"] }]
}"#;

#[test]
fn test_generic_class_requires_arguments() {
    let model = model(CLASSES);
    let classes = ClassIndex::new(&model.classes);
    let (mut table, _, mut ctx) = open(&model, &classes);

    let err = table.binding_for(&key("Repo"), false, &mut ctx).unwrap_err();
    assert!(matches!(
        err,
        BindingErrorKind::GenericWithoutArguments { ref class, .. } if class == "Repo"
    ));

    let repo = table.binding_for(&key("Repo<User>"), false, &mut ctx).unwrap();
    let Binding::ConstructorInjected(ctor) = repo.as_ref() else {
        panic!("expected constructor injection, got {repo}");
    };
    assert_eq!(ctor.class.to_string(), "Repo<User>");
    assert_eq!(ctor.dependencies[0].key, key("Dao<User>"));
    assert!(ctor.dependencies[1].is_deferred());
}

#[test]
fn test_objects_and_scoped_classes() {
    let model = model(CLASSES);
    let classes = ClassIndex::new(&model.classes);
    let (mut table, _, mut ctx) = open(&model, &classes);

    let clock = table.binding_for(&key("Clock"), false, &mut ctx).unwrap();
    assert!(matches!(clock.as_ref(), Binding::ObjectInstance(_)));

    let cache = table.binding_for(&key("Cache"), false, &mut ctx).unwrap();
    assert_eq!(cache.scope(), Some(&Scope::new("AppScope")));
    assert_eq!(ctx.slot_of(&key("Cache")).unwrap().owner, "AppGraph");

    let session = table.binding_for(&key("Session"), false, &mut ctx);
    assert!(matches!(
        session.unwrap_err(),
        BindingErrorKind::IncompatibleScope { ref graph, .. } if graph == "AppGraph"
    ));
}

#[test]
fn test_defaults_and_unresolved() {
    let model = model(CLASSES);
    let classes = ClassIndex::new(&model.classes);
    let (mut table, _, mut ctx) = open(&model, &classes);

    let absent = table.binding_for(&key("Timeout"), true, &mut ctx).unwrap();
    assert!(matches!(absent.as_ref(), Binding::Absent(_)));
    let again = table.binding_for(&key("Timeout"), true, &mut ctx).unwrap();
    assert!(Arc::ptr_eq(&absent, &again));

    assert_eq!(
        table.binding_for(&key("Timeout"), false, &mut ctx).unwrap_err(),
        BindingErrorKind::Unresolved { key: key("Timeout") }
    );
}

#[test]
fn test_parent_bindings_become_graph_dependencies() {
    let model = model(
        r#"{ "graphs": [
            { "name": "AppGraph", "bindings": [
                { "key": { "type": "Config" }, "kind": { "provides": { "factory": "config" } } }
            ] },
            { "name": "ChildGraph", "parent": "AppGraph" }
        ] }"#,
    );
    let classes = ClassIndex::default();
    let (_, _, mut ctx) = open(&model, &classes);
    let (mut child, errors) = BindingTable::build(&model.graphs[1], &classes);
    assert!(errors.is_empty());
    ctx.push("ChildGraph", Vec::new(), Vec::new());

    let config = child.binding_for(&key("Config"), false, &mut ctx).unwrap();
    let Binding::GraphDependency(dep) = config.as_ref() else {
        panic!("expected a graph dependency, got {config}");
    };
    assert_eq!(dep.slot.owner, "AppGraph");
    assert_eq!(ctx.pop().unwrap().used, Vec::new());
    assert_eq!(
        ctx.used_at_current(),
        vec![(key("Config"), "ChildGraph".to_string())]
    );
}
