use super::*;
use crate::keys::WrappingKind;

const MODEL: &str = r#"{
  "classes": [
    {
      "type": "Repo",
      "typeParameters": ["T"],
      "kind": { "injectable": { "parameters": [ { "type": "Dao<T>" } ] } }
    },
    { "type": "Clock", "scope": "AppScope", "kind": "object" }
  ],
  "graphs": [
    {
      "name": "AppGraph",
      "scopes": ["AppScope"],
      "accessors": [ { "name": "plugins", "type": "Set<Plugin>" } ],
      "bindings": [
        {
          "key": { "type": "Plugin" },
          "kind": "intoSet",
          "dependencies": [ { "type": "Clock", "wrapping": "provider" } ],
          "origin": "PluginModule.logging"
        },
        {
          "key": { "type": "Handler" },
          "kind": { "intoMap": { "mapKey": { "type": "String", "value": "get" } } }
        },
        {
          "key": { "type": "Set<Plugin>" },
          "kind": { "multibinds": { "allowEmpty": true } }
        },
        {
          "key": { "type": "Api", "qualifier": "Named(\"v2\")" },
          "kind": { "binds": { "target": { "type": "ApiV2" } } }
        }
      ]
    },
    { "name": "LoginGraph", "parent": "AppGraph" }
  ]
}"#;

#[test]
fn test_parse_declaration_model() {
    let model = DeclarationModel::from_json(MODEL).unwrap();
    assert_eq!(model.classes.len(), 2);
    assert_eq!(model.classes[0].type_parameters, vec!["T".to_string()]);
    assert!(matches!(model.classes[1].kind, ClassKind::Object));

    let app = model.graph("AppGraph").unwrap();
    assert!(app.declares_scope(&Scope::new("AppScope")));
    assert_eq!(app.accessors[0].key.key.ty.to_string(), "Set<Plugin>");

    let plugin = &app.bindings[0];
    assert!(plugin.kind.is_contribution());
    assert_eq!(plugin.dependencies[0].wrapping, WrappingKind::Provider);
    assert_eq!(plugin.origin_name(), "PluginModule.logging");

    match &app.bindings[1].kind {
        DeclarationKind::IntoMap { map_key } => {
            assert_eq!(map_key.value, "get");
            assert_eq!(map_key.ty.name(), "String");
        }
        other => panic!("unexpected kind {other:?}"),
    }
    assert!(matches!(
        app.bindings[2].kind,
        DeclarationKind::Multibinds { allow_empty: true }
    ));
    assert_eq!(app.bindings[3].origin_name(), "@Named(\"v2\") Api");

    let login = model.graph("LoginGraph").unwrap();
    assert_eq!(login.parent.as_deref(), Some("AppGraph"));
    assert!(login.bindings.is_empty());
}

#[test]
fn test_rejects_malformed_type_text() {
    let bad = r#"{ "graphs": [ { "name": "G", "accessors": [ { "name": "x", "type": "List<" } ] } ] }"#;
    assert!(DeclarationModel::from_json(bad).is_err());
}
