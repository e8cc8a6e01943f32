//! End-to-end tests for controllers declared with `#[controller]`.

use std::sync::Arc;

use bridge_runtime::types::{
    Access, CallResult, CollectionAction, ControllerChange, ErrorKind, HostBoundary,
    NamingConvention,
};
use bridge_runtime::{ControllerHost, PropertyValue, TypeRegistry, controller};
use serde_json::json;

#[derive(Default)]
struct Thermostat {
    target: f64,
    unit: String,
    readings: Vec<f64>,
    log: Vec<String>,
    secret: String,
}

#[controller(properties(unit), readonly(target), collections(readings))]
impl Thermostat {
    pub fn set_target(&mut self, target: f64) {
        self.target = target;
        self.log.push(format!("target {target}"));
    }

    pub fn average(&self) -> f64 {
        match self.helper() {
            0 => 0.0,
            n => self.readings.iter().sum::<f64>() / n as f64,
        }
    }

    pub fn describe(&self, prefix: String, precision: u8) -> String {
        format!("{prefix}{:.*}", precision as usize, self.target)
    }

    #[bridge(get = "LogSize")]
    pub fn log_size(&self) -> usize {
        self.log.len()
    }

    #[bridge(set = "Secret")]
    pub fn set_secret(&mut self, secret: String) {
        self.secret = secret;
    }

    #[bridge(name = "Reset")]
    pub fn reset_all(&mut self) {
        self.readings.clear();
    }

    #[bridge(name = "Reset")]
    pub fn reset_target(&mut self) {
        self.target = 0.0;
    }

    pub fn fill(&self, out: &mut Vec<f64>) {
        out.extend(&self.readings);
    }

    pub fn unit_ref(&self) -> &str {
        &self.unit
    }

    pub async fn refresh(&mut self) {}

    #[bridge(skip)]
    pub fn internal_state(&self) -> String {
        self.secret.clone()
    }

    fn helper(&self) -> usize {
        self.readings.len()
    }
}

fn host() -> Arc<ControllerHost> {
    let host = ControllerHost::with_registry(NamingConvention::CamelCase, Arc::new(TypeRegistry::new()));
    host.register_default::<Thermostat>();
    Arc::new(host)
}

#[test]
fn test_description_lists_callable_surface() {
    let host = host();
    let description = host.create_controller("Thermostat").unwrap();

    let mut methods: Vec<_> = description.methods.iter().map(|m| m.name.as_str()).collect();
    methods.sort();
    assert_eq!(methods, vec!["average", "describe", "setTarget"]);

    assert_eq!(description.property("unit").unwrap().access, Access::READ_WRITE);
    assert_eq!(description.property("target").unwrap().access, Access::READ);
    assert_eq!(description.property("logSize").unwrap().value, Some(json!(0)));
    assert_eq!(description.property("secret").unwrap().access, Access::WRITE);
    assert_eq!(description.property("readings").unwrap().value, Some(json!([])));
}

#[test]
fn test_excluded_members_are_reported() {
    let host = host();
    host.create_controller("Thermostat").unwrap();

    let info = host.registry().ensure_registered::<Thermostat>();
    let warnings = info.warnings().join("\n");
    assert!(warnings.contains("Fill"));
    assert!(warnings.contains("UnitRef"));
    assert!(warnings.contains("Refresh"));
    assert_eq!(warnings.matches("Reset").count(), 2);
    assert!(!warnings.contains("InternalState"));
    assert!(!warnings.contains("Helper"));
}

#[test]
fn test_calls_by_any_case() {
    let host = host();
    let id = host.create_controller("thermostat").unwrap().id;

    assert!(host.call_method(id, "set_target", &[json!(21.5)]).unwrap().is_undefined());
    assert_eq!(
        host.call_method(id, "Describe", &[json!("t="), json!(1)]).unwrap(),
        CallResult::Value(json!("t=21.5"))
    );
    assert_eq!(
        host.get_description(id).unwrap().property("logSize").unwrap().value,
        Some(json!(1))
    );
}

#[test]
fn test_call_errors_map_to_remote_kinds() {
    let host = host();
    let id = host.create_controller("Thermostat").unwrap().id;

    let err = HostBoundary::call_method(&*host, id, "setTarget", vec![]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ArityMismatch);

    let err = HostBoundary::call_method(&*host, id, "setTarget", vec![json!("warm")]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ArgumentTypeMismatch);
    assert!(err.message.contains("Argument 0"));

    let err = HostBoundary::call_method(&*host, id, "reset", vec![]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    let err = HostBoundary::call_method(&*host, id, "", vec![]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidArgument);
}

#[test]
fn test_write_only_property_checks_type() {
    let host = host();
    let id = host.create_controller("Thermostat").unwrap().id;

    assert!(!host.try_set_property(id, "secret", PropertyValue::native(7i32)).unwrap());
    assert!(host.try_set_property(id, "secret", PropertyValue::native("s3cr3t".to_string())).unwrap());
    let secret = host.mutate::<Thermostat, _>(id, |t| t.secret.clone()).unwrap();
    assert_eq!(secret, "s3cr3t");
}

#[test]
fn test_type_info_built_once_for_many_instances() {
    let host = host();
    for _ in 0..5 {
        host.create_controller("Thermostat").unwrap();
    }
    assert_eq!(host.registry().build_count(), 1);
    assert_eq!(host.len(), 5);
}

#[test]
fn test_ui_sync_then_host_push() {
    let host = host();
    let id = host.create_controller("Thermostat").unwrap().id;

    let mut change = ControllerChange::new(id);
    change.set_property("unit", json!("C"));
    change.add_collection_actions(
        "readings",
        vec![CollectionAction::add(vec![json!(20.0), json!(22.0)], 0)],
    );
    HostBoundary::sync_controller_changes(&*host, vec![change]);
    assert!(host.take_changes().is_empty());

    assert_eq!(
        host.call_method(id, "average", &[]).unwrap(),
        CallResult::Value(json!(21.0))
    );

    host.mutate::<Thermostat, _>(id, |t| {
        t.readings.remove(0);
        t.unit = "F".to_string();
    })
    .unwrap();

    let changes = host.take_changes();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].properties["unit"], json!("F"));
    assert_eq!(changes[0].collection_actions("readings"), &[CollectionAction::remove(0)]);
}
