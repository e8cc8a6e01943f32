//! Demo controllers and an in-process loopback session.
//!
//! `bridge serve` exposes these controllers over IPC. `bridge demo` binds
//! them to a UI runtime in the same process and logs every boundary call.

use std::sync::Arc;

use bridge_runtime::{ControllerHost, controller};
use bridge_types::{
    CallResult, ControllerChange, ControllerDescription, ControllerId, HostBoundary, RemoteError,
};
use bridge_ui::{UiRuntimeHandle, spawn_ui_runtime};
use serde_json::{Value, json};
use tracing::info;

use crate::config::BridgeConfig;

// ─────────────────────────────────────────────────────────────────────────────
// Controllers
// ─────────────────────────────────────────────────────────────────────────────

/// Counts up by a configurable step and keeps every value it reached
pub struct Counter {
    count: i64,
    step: i64,
    history: Vec<i64>,
}

impl Default for Counter {
    fn default() -> Self {
        Self {
            count: 0,
            step: 1,
            history: Vec::new(),
        }
    }
}

#[controller(properties(count, step), collections(history))]
impl Counter {
    pub fn increment(&mut self) -> i64 {
        self.count += self.step;
        self.history.push(self.count);
        self.count
    }

    pub fn reset(&mut self) {
        self.count = 0;
        self.history.clear();
    }
}

/// A titled list of items
#[derive(Default)]
pub struct TodoList {
    title: String,
    items: Vec<String>,
}

#[controller(properties(title), collections(items))]
impl TodoList {
    pub fn add(&mut self, item: String) {
        self.items.push(item);
    }

    pub fn remove(&mut self, index: usize) -> bool {
        if index < self.items.len() {
            self.items.remove(index);
            true
        } else {
            false
        }
    }

    #[bridge(get = "Remaining")]
    pub fn remaining(&self) -> usize {
        self.items.len()
    }
}

/// Make the demo controllers creatable on `host`
pub fn register_demo_controllers(host: &ControllerHost) {
    host.register_default::<Counter>();
    host.register(|| TodoList {
        title: "Groceries".to_string(),
        items: Vec::new(),
    });
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging link
// ─────────────────────────────────────────────────────────────────────────────

/// Forwards boundary calls to a host and logs each one
pub struct LoggingLink {
    host: Arc<ControllerHost>,
}

impl LoggingLink {
    pub fn new(host: Arc<ControllerHost>) -> Self {
        Self { host }
    }
}

impl HostBoundary for LoggingLink {
    fn create_controller(&self, name: &str) -> Result<ControllerDescription, RemoteError> {
        info!("→ createController({})", name);
        HostBoundary::create_controller(&*self.host, name)
    }

    fn call_method(
        &self,
        id: ControllerId,
        name: &str,
        args: Vec<Value>,
    ) -> Result<CallResult, RemoteError> {
        info!("→ callMethod({}, {}, {})", id, name, serde_json::Value::Array(args.clone()));
        let result = HostBoundary::call_method(&*self.host, id, name, args);
        info!("← {:?}", result);
        result
    }

    fn call_internal_method(
        &self,
        id: ControllerId,
        name: &str,
        args: Vec<Value>,
    ) -> Result<CallResult, RemoteError> {
        info!("→ callInternalMethod({}, {})", id, name);
        HostBoundary::call_internal_method(&*self.host, id, name, args)
    }

    fn destroy_controller(&self, id: ControllerId) {
        info!("→ destroyController({})", id);
        HostBoundary::destroy_controller(&*self.host, id);
    }

    fn sync_controller_changes(&self, batch: Vec<ControllerChange>) {
        for change in &batch {
            info!(
                "→ syncControllerChanges({}): {}",
                change.id,
                serde_json::to_string(change).unwrap_or_default()
            );
        }
        HostBoundary::sync_controller_changes(&*self.host, batch);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Loopback session
// ─────────────────────────────────────────────────────────────────────────────

/// Final UI-side state of a loopback session
#[derive(Debug)]
pub struct LoopbackReport {
    pub counter: Value,
    pub todo: Value,
}

/// Deliver queued host changes to the UI runtime
async fn pump(host: &ControllerHost, ui: &UiRuntimeHandle) -> anyhow::Result<usize> {
    let changes = host.take_changes();
    let count = changes.len();
    for change in &changes {
        info!(
            "← push({}): {}",
            change.id,
            serde_json::to_string(change).unwrap_or_default()
        );
    }
    if count > 0 {
        ui.apply_changes(changes).await?;
    }
    Ok(count)
}

/// Run a scripted session between a UI runtime and a host in this process
pub async fn run_loopback(config: &BridgeConfig) -> anyhow::Result<LoopbackReport> {
    let host = Arc::new(ControllerHost::new(config.bridge.naming));
    register_demo_controllers(&host);
    info!("Host ready: {:?}", host.controller_names());

    let link: Arc<dyn HostBoundary> = Arc::new(LoggingLink::new(host.clone()));
    let ui = spawn_ui_runtime("bridge-ui".to_string(), link, config.ui_options())?;

    // Counter: UI calls, host edits, UI edits
    let counter = ui.create_controller("Counter").await?;
    ui.call_method(counter, "increment", vec![]).await?;
    pump(&host, &ui).await?;

    host.mutate(counter, |c: &mut Counter| c.step = 5)?;
    pump(&host, &ui).await?;

    ui.update(counter, |scope| {
        scope.set("step", json!(2));
    })
    .await?;
    ui.call_method(counter, "increment", vec![]).await?;
    pump(&host, &ui).await?;

    // TodoList: collection edits in both directions
    let todo = ui.create_controller("todoList").await?;
    ui.update(todo, |scope| {
        if let Some(items) = scope.collection_mut("items") {
            items.push(json!("eggs"));
        }
    })
    .await?;
    ui.call_method(todo, "add", vec![json!("milk")]).await?;
    pump(&host, &ui).await?;

    let report = LoopbackReport {
        counter: ui.snapshot(counter).await?,
        todo: ui.snapshot(todo).await?,
    };
    info!("Counter: {}", report.counter);
    info!("TodoList: {}", report.todo);

    ui.destroy_controller(counter).await?;
    ui.destroy_controller(todo).await?;
    ui.terminate();
    tokio::task::spawn_blocking(move || ui.join()).await??;

    info!("Loopback finished, {} controllers left on host", host.len());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_runtime::TypeRegistry;
    use bridge_types::NamingConvention;

    fn host() -> ControllerHost {
        let host = ControllerHost::with_registry(
            NamingConvention::CamelCase,
            Arc::new(TypeRegistry::new()),
        );
        register_demo_controllers(&host);
        host
    }

    #[test]
    fn test_demo_descriptions() {
        let host = host();
        assert_eq!(host.controller_names(), vec!["Counter", "TodoList"]);

        let counter = host.create_controller("Counter").unwrap();
        let mut methods: Vec<_> = counter.methods.iter().map(|m| m.name.as_str()).collect();
        methods.sort();
        assert_eq!(methods, vec!["increment", "reset"]);
        assert_eq!(counter.property("step").unwrap().value, Some(json!(1)));

        let todo = host.create_controller("TodoList").unwrap();
        assert_eq!(todo.property("title").unwrap().value, Some(json!("Groceries")));
        assert_eq!(todo.property("remaining").unwrap().value, Some(json!(0)));
    }

    #[test]
    fn test_increment_pushes_count_and_history() {
        let host = host();
        let id = host.create_controller("Counter").unwrap().id;

        let result = host.call_method(id, "Increment", &[]).unwrap();
        assert_eq!(result, CallResult::Value(json!(1)));

        let changes = host.take_changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].properties["count"], json!(1));
        assert_eq!(changes[0].collection_actions("history").len(), 1);
    }

    #[tokio::test]
    async fn test_loopback_session() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let report = run_loopback(&BridgeConfig::default()).await.unwrap();

        // 1, then step 5 from the host, overridden by step 2 from the UI
        assert_eq!(report.counter["count"], json!(3));
        assert_eq!(report.counter["step"], json!(2));
        assert_eq!(report.counter["history"], json!([1, 3]));

        assert_eq!(report.todo["title"], json!("Groceries"));
        assert_eq!(report.todo["items"], json!(["eggs", "milk"]));
        assert_eq!(report.todo["remaining"], json!(2));
    }
}
