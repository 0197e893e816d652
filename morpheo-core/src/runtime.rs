//! Intelligent component runtime
//!
//! Owns the live instances of a mounted tree, the connection graph between
//! their points, the values that arrived over it and the behaviors attached
//! to each instance.
//!
//! Propagation is single hop: [`send_event`](ComponentRuntime::send_event)
//! delivers to the direct targets of a point and stops. Anything a target's
//! behavior emits in response is queued, and [`pump`](ComponentRuntime::pump)
//! sends the queue on, one hop per entry, so chains and cycles advance
//! iteratively and stay bounded.
//!
//! ```ignore
//! let mut runtime = ComponentRuntime::new(registry);
//! runtime.mount(&config.root());
//! runtime.connect("plus", "click", "count", "increment", None)?;
//! runtime.trigger("plus", "click", Value::Null)?;
//! assert_eq!(runtime.connection_value("count", "value"), Some(json!(1)));
//! ```

use std::collections::{HashMap, VecDeque};
use std::mem;
use std::sync::Arc;
use std::time::Duration;

use ratatui::{layout::Rect, Frame};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::action::StateAction;
use crate::behavior::{BehaviorEngine, BehaviorRegistry};
use crate::capability::{validate_endpoints, Connection, ConnectionId, ConnectionPoint, Transform};
use crate::component::{Component, EventHandler};
use crate::error::ConnectionError;
use crate::instruction::{Instruction, InstructionHost, Interpreter, Scope};
use crate::registry::{ComponentInstance, ComponentRegistry};
use crate::render::RenderContext;

/// Upper bound on queued emissions sent by one [`ComponentRuntime::pump`]
pub const MAX_PUMP_STEPS: usize = 256;

/// An event sent from a component point
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentEvent {
    pub component_id: String,
    pub event_type: String,
    pub point: String,
    pub payload: Value,
}

/// What a single send reached
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Propagation {
    /// Edges the value travelled along
    pub delivered: usize,
    /// Behavior emissions queued for [`ComponentRuntime::pump`]
    pub queued: usize,
}

/// Instructions deferred by `setTimeout`, to be run by the host loop
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledWork {
    pub component_id: String,
    pub delay: Duration,
    pub actions: Vec<Instruction>,
}

#[derive(Debug)]
struct Pending {
    component_id: String,
    point: String,
    value: Value,
}

type EventListener = Box<dyn FnMut(&ComponentEvent) + Send>;

pub struct ComponentRuntime {
    registry: Arc<ComponentRegistry>,
    instances: HashMap<String, ComponentInstance>,
    /// Tree structure of everything mounted, registered or not
    children: HashMap<String, Vec<String>>,
    connections: Vec<Connection>,
    inbound: HashMap<(String, String), Value>,
    behaviors: BehaviorEngine,
    outbox: VecDeque<Pending>,
    listeners: Vec<EventListener>,
    dispatched: Vec<StateAction>,
    scheduled: Vec<ScheduledWork>,
    interpreter: Interpreter,
}

impl std::fmt::Debug for ComponentRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRuntime")
            .field("instances", &self.instances.len())
            .field("connections", &self.connections.len())
            .field("pending", &self.outbox.len())
            .finish()
    }
}

impl ComponentRuntime {
    /// Runtime with the built-in behaviors
    pub fn new(registry: Arc<ComponentRegistry>) -> Self {
        Self::with_behaviors(registry, BehaviorRegistry::with_defaults())
    }

    pub fn with_behaviors(registry: Arc<ComponentRegistry>, behaviors: BehaviorRegistry) -> Self {
        Self {
            registry,
            instances: HashMap::new(),
            children: HashMap::new(),
            connections: Vec::new(),
            inbound: HashMap::new(),
            behaviors: BehaviorEngine::new(behaviors),
            outbox: VecDeque::new(),
            listeners: Vec::new(),
            dispatched: Vec::new(),
            scheduled: Vec::new(),
            interpreter: Interpreter,
        }
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn behaviors(&self) -> &BehaviorEngine {
        &self.behaviors
    }

    pub fn instance(&self, id: &str) -> Option<&ComponentInstance> {
        self.instances.get(id)
    }

    pub fn instances(&self) -> impl Iterator<Item = &ComponentInstance> {
        self.instances.values()
    }

    pub fn is_mounted(&self, id: &str) -> bool {
        self.instances.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    // ---------------------------------------------------------------------
    // Mounting
    // ---------------------------------------------------------------------

    /// Create instances for every registered node in the tree
    ///
    /// Nodes that are already mounted keep their instance and state. Returns
    /// the ids of the newly created instances.
    pub fn mount(&mut self, root: &Component) -> Vec<String> {
        let mut mounted = Vec::new();
        self.mount_node(root, &mut mounted);
        mounted
    }

    fn mount_node(&mut self, node: &Component, mounted: &mut Vec<String>) {
        self.children.insert(
            node.id.clone(),
            node.child_nodes().map(|c| c.id.clone()).collect(),
        );

        if !self.instances.contains_key(&node.id) {
            match self.registry.create_instance(&node.kind, &node.props) {
                Ok(mut instance) => {
                    instance.id = node.id.clone();
                    instance.styles = node.styles.clone();
                    instance.events = node.events.clone();
                    instance.methods = node.methods.clone();
                    self.instances.insert(node.id.clone(), instance);
                    self.attach_behaviors(node);
                    mounted.push(node.id.clone());
                }
                Err(e) => debug!(component = %node.id, error = %e, "Not mounting component"),
            }
        }

        for child in node.child_nodes() {
            self.mount_node(child, mounted);
        }
    }

    fn attach_behaviors(&mut self, node: &Component) {
        let Some(properties) = self.instances.get(&node.id).map(|i| i.properties.clone()) else {
            return;
        };
        let names: Vec<String> = match properties.get("behavior") {
            Some(Value::String(name)) => vec![name.clone()],
            Some(Value::Array(names)) => names
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => self
                .registry
                .definition(&node.kind)
                .map(|d| d.meta.behaviors.clone())
                .unwrap_or_default(),
        };
        if names.is_empty() {
            return;
        }

        let mut options: Map<String, Value> = properties.clone();
        if let Some(Value::Object(extra)) = properties.get("behaviorOptions") {
            options.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        for name in &names {
            if let Err(e) = self.behaviors.attach(&node.id, name, &options) {
                warn!(component = %node.id, error = %e, "Failed to attach behavior");
            }
        }
        self.sync_behavior_state(&node.id);
    }

    /// Mount `root` and unmount every instance that is no longer in it
    ///
    /// Returns the ids of the removed instances.
    pub fn sync_tree(&mut self, root: &Component) -> Vec<String> {
        let live: std::collections::HashSet<&str> =
            root.descendants().into_iter().map(|c| c.id.as_str()).collect();
        let stale: Vec<String> = self
            .instances
            .keys()
            .filter(|id| !live.contains(id.as_str()))
            .cloned()
            .collect();

        for id in &stale {
            self.remove_instance(id);
        }
        self.children.clear();
        self.mount(root);
        stale
    }

    /// Remove a component and its subtree, tearing down every edge touching them
    ///
    /// Returns how many instances were removed.
    pub fn unmount(&mut self, id: &str) -> usize {
        let mut removed = 0;
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            if let Some(children) = self.children.remove(&current) {
                stack.extend(children);
            }
            if self.remove_instance(&current) {
                removed += 1;
            }
        }
        removed
    }

    fn remove_instance(&mut self, id: &str) -> bool {
        if self.instances.remove(id).is_none() {
            return false;
        }
        let touching: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|c| c.touches(id))
            .map(|c| c.id.clone())
            .collect();
        for connection in &touching {
            self.disconnect(connection);
        }
        self.behaviors.detach(id);
        self.inbound.retain(|(component, _), _| component != id);
        self.outbox.retain(|pending| pending.component_id != id);
        debug!(component = %id, edges = touching.len(), "Unmounted component");
        true
    }

    // ---------------------------------------------------------------------
    // Connection graph
    // ---------------------------------------------------------------------

    /// A point declared by the component's type or by its behaviors
    pub fn connection_point(&self, component_id: &str, point: &str) -> Option<ConnectionPoint> {
        let instance = self.instances.get(component_id)?;
        self.registry
            .definition(&instance.kind)
            .and_then(|d| d.meta.connection_point(point).cloned())
            .or_else(|| self.behaviors.connection_point(component_id, point))
    }

    fn require_point(
        &self,
        component_id: &str,
        point: &str,
    ) -> Result<ConnectionPoint, ConnectionError> {
        if !self.instances.contains_key(component_id) {
            return Err(ConnectionError::UnknownComponent(component_id.to_string()));
        }
        self.connection_point(component_id, point)
            .ok_or_else(|| ConnectionError::UnknownConnectionPoint {
                component: component_id.to_string(),
                point: point.to_string(),
            })
    }

    /// Add an edge; on error the graph is unchanged
    pub fn connect(
        &mut self,
        source_id: &str,
        source_point: &str,
        target_id: &str,
        target_point: &str,
        transform: Option<Transform>,
    ) -> Result<ConnectionId, ConnectionError> {
        let source = self.require_point(source_id, source_point)?;
        let target = self.require_point(target_id, target_point)?;
        let check = validate_endpoints(&source, &target)?;
        if check.type_mismatch && transform.is_none() {
            warn!(
                source = %format!("{source_id}.{source_point}"),
                source_type = %source.data_type,
                target = %format!("{target_id}.{target_point}"),
                target_type = %target.data_type,
                "Connecting mismatched data types without a transform"
            );
        }

        let id = ConnectionId::generate();
        self.connections.push(Connection {
            id: id.clone(),
            source_component_id: source_id.to_string(),
            source_connection_id: source_point.to_string(),
            target_component_id: target_id.to_string(),
            target_connection_id: target_point.to_string(),
            transform,
        });
        for endpoint in [source_id, target_id] {
            if let Some(instance) = self.instances.get_mut(endpoint) {
                instance.connections.insert(id.clone());
            }
        }
        debug!(connection = %id, source = %source_id, target = %target_id, "Connected");
        Ok(id)
    }

    /// Remove an edge; returns whether it existed
    pub fn disconnect(&mut self, id: &ConnectionId) -> bool {
        let Some(index) = self.connections.iter().position(|c| &c.id == id) else {
            return false;
        };
        let connection = self.connections.remove(index);
        for endpoint in [
            &connection.source_component_id,
            &connection.target_component_id,
        ] {
            if let Some(instance) = self.instances.get_mut(endpoint) {
                instance.connections.remove(id);
            }
        }
        let target = &connection.target_component_id;
        let point = &connection.target_connection_id;
        if !self.is_connected_into(target, point) {
            self.inbound.remove(&(target.clone(), point.clone()));
        }
        debug!(connection = %id, "Disconnected");
        true
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn connection(&self, id: &ConnectionId) -> Option<&Connection> {
        self.connections.iter().find(|c| &c.id == id)
    }

    /// Edges touching a component
    pub fn connections_of(&self, component_id: &str) -> Vec<&Connection> {
        self.connections
            .iter()
            .filter(|c| c.touches(component_id))
            .collect()
    }

    fn is_connected_into(&self, component_id: &str, point: &str) -> bool {
        self.connections
            .iter()
            .any(|c| c.is_into(component_id, point))
    }

    /// Live value of a point
    ///
    /// A value that arrived over a live edge wins; then instance state, then
    /// the instance's own property, then the point's default.
    pub fn connection_value(&self, component_id: &str, point: &str) -> Option<Value> {
        let instance = self.instances.get(component_id)?;
        if self.is_connected_into(component_id, point) {
            if let Some(value) = self
                .inbound
                .get(&(component_id.to_string(), point.to_string()))
            {
                return Some(value.clone());
            }
        }
        instance
            .state
            .get(point)
            .or_else(|| instance.properties.get(point))
            .cloned()
            .or_else(|| {
                self.connection_point(component_id, point)
                    .map(|p| p.default_value)
            })
    }

    // ---------------------------------------------------------------------
    // Propagation
    // ---------------------------------------------------------------------

    /// Observe every event sent through the runtime
    pub fn on_event<F>(&mut self, listener: F)
    where
        F: FnMut(&ComponentEvent) + Send + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Push a value out of `point` along every outbound edge (one hop)
    pub fn send_event(
        &mut self,
        component_id: &str,
        event_type: &str,
        point: &str,
        payload: Value,
    ) -> Result<Propagation, ConnectionError> {
        let Some(instance) = self.instances.get_mut(component_id) else {
            return Err(ConnectionError::UnknownComponent(component_id.to_string()));
        };
        instance.state.insert(point.to_string(), payload.clone());

        let event = ComponentEvent {
            component_id: component_id.to_string(),
            event_type: event_type.to_string(),
            point: point.to_string(),
            payload,
        };
        for listener in &mut self.listeners {
            listener(&event);
        }

        let edges: Vec<Connection> = self
            .connections
            .iter()
            .filter(|c| c.is_from(component_id, point))
            .cloned()
            .collect();

        let mut propagation = Propagation::default();
        for edge in edges {
            let value = match &edge.transform {
                Some(transform) => transform.apply(&event.payload),
                None => event.payload.clone(),
            };
            let value = self.coerce_for(&edge.target_component_id, &edge.target_connection_id, value);
            self.inbound.insert(
                (
                    edge.target_component_id.clone(),
                    edge.target_connection_id.clone(),
                ),
                value.clone(),
            );
            propagation.delivered += 1;
            propagation.queued +=
                self.react(&edge.target_component_id, &edge.target_connection_id, &value);
        }
        Ok(propagation)
    }

    fn coerce_for(&self, component_id: &str, point: &str, value: Value) -> Value {
        let Some(target) = self.connection_point(component_id, point) else {
            return value;
        };
        match target.data_type.coerce(&value) {
            Some(coerced) => coerced,
            None => {
                warn!(
                    target = %format!("{component_id}.{point}"),
                    expected = %target.data_type,
                    value = %value,
                    "Delivering value that does not match the point type"
                );
                value
            }
        }
    }

    /// Run behaviors for inbound data; returns how many emissions were queued
    fn react(&mut self, component_id: &str, point: &str, value: &Value) -> usize {
        let emissions = self.behaviors.on_data_received(component_id, point, value);
        self.sync_behavior_state(component_id);
        let count = emissions.len();
        self.outbox.extend(emissions.into_iter().map(|e| Pending {
            component_id: component_id.to_string(),
            point: e.point,
            value: e.value,
        }));
        count
    }

    fn sync_behavior_state(&mut self, component_id: &str) {
        let state = self.behaviors.state(component_id);
        if let Some(instance) = self.instances.get_mut(component_id) {
            instance.state.extend(state);
        }
    }

    /// Deliver data straight to a component's point, as local input would
    ///
    /// Returns how many emissions were queued.
    pub fn receive(
        &mut self,
        component_id: &str,
        point: &str,
        data: Value,
    ) -> Result<usize, ConnectionError> {
        if !self.instances.contains_key(component_id) {
            return Err(ConnectionError::UnknownComponent(component_id.to_string()));
        }
        let data = self.coerce_for(component_id, point, data);
        Ok(self.react(component_id, point, &data))
    }

    /// Send queued emissions on, one hop each
    ///
    /// Returns how many were sent. Stops after [`MAX_PUMP_STEPS`] and drops
    /// the rest.
    pub fn pump(&mut self) -> usize {
        let mut steps = 0;
        while let Some(pending) = self.outbox.pop_front() {
            if steps == MAX_PUMP_STEPS {
                warn!(
                    limit = MAX_PUMP_STEPS,
                    dropped = self.outbox.len() + 1,
                    "Propagation limit reached, dropping queued emissions"
                );
                self.outbox.clear();
                break;
            }
            steps += 1;
            if let Err(e) = self.send_event(
                &pending.component_id,
                &pending.point,
                &pending.point,
                pending.value,
            ) {
                debug!(error = %e, "Dropping emission");
            }
        }
        steps
    }

    pub fn has_pending(&self) -> bool {
        !self.outbox.is_empty()
    }

    // ---------------------------------------------------------------------
    // Events and methods
    // ---------------------------------------------------------------------

    /// Fire a component event: run its handler, propagate from the point of
    /// the same name if there is one, then pump
    pub fn trigger(
        &mut self,
        component_id: &str,
        event: &str,
        payload: Value,
    ) -> Result<Propagation, ConnectionError> {
        let Some(instance) = self.instances.get(component_id) else {
            return Err(ConnectionError::UnknownComponent(component_id.to_string()));
        };

        let actions = match instance.events.get(event) {
            Some(EventHandler::Method(name)) => match instance.methods.get(name) {
                Some(method) => Some(method.actions.clone()),
                None => {
                    warn!(component = %component_id, method = %name, "Event names an unknown method");
                    None
                }
            },
            Some(EventHandler::Actions { actions }) => Some(actions.clone()),
            Some(EventHandler::Dispatch {
                dispatch,
                payload: action_payload,
            }) => {
                let payload = action_payload.clone().unwrap_or_else(|| payload.clone());
                let mut action = StateAction::new(dispatch.clone());
                if !payload.is_null() {
                    action = action.with_payload(payload);
                }
                self.dispatched.push(action);
                None
            }
            Some(EventHandler::Raw(raw)) => {
                debug!(component = %component_id, event = %event, handler = %raw, "Ignoring raw handler");
                None
            }
            None => instance.methods.get(event).map(|m| m.actions.clone()),
        };

        if let Some(actions) = actions {
            self.run_instructions(component_id, &actions, Scope::for_event(payload.clone()));
        }

        let propagation = match self.connection_point(component_id, event) {
            Some(point) if point.direction.can_source() => {
                self.send_event(component_id, event, event, payload)?
            }
            _ => Propagation::default(),
        };
        self.pump();
        Ok(propagation)
    }

    /// Run instructions on behalf of a component
    pub fn run_instructions(&mut self, component_id: &str, actions: &[Instruction], mut scope: Scope) {
        let interpreter = self.interpreter;
        let mut host = RuntimeHost {
            runtime: self,
            component_id,
        };
        let outcome = interpreter.run(actions, &mut scope, &mut host);
        self.scheduled
            .extend(outcome.scheduled.into_iter().map(|s| ScheduledWork {
                component_id: component_id.to_string(),
                delay: s.delay,
                actions: s.actions,
            }));
    }

    /// Run deferred work once its delay has passed
    pub fn run_scheduled(&mut self, work: ScheduledWork) {
        if !self.instances.contains_key(&work.component_id) {
            debug!(component = %work.component_id, "Skipping work for unmounted component");
            return;
        }
        self.run_instructions(&work.component_id, &work.actions, Scope::new());
        self.pump();
    }

    /// Store actions produced by handlers since the last call
    pub fn take_dispatched(&mut self) -> Vec<StateAction> {
        mem::take(&mut self.dispatched)
    }

    /// `setTimeout` work produced since the last call
    pub fn take_scheduled(&mut self) -> Vec<ScheduledWork> {
        mem::take(&mut self.scheduled)
    }

    // ---------------------------------------------------------------------
    // Rendering
    // ---------------------------------------------------------------------

    pub fn render(&self, root: &Component, frame: &mut Frame, area: Rect, focused: Option<&str>) {
        RenderContext::new(&self.registry)
            .with_runtime(self)
            .with_focus(focused)
            .render(root, frame, area);
    }
}

/// Instruction host acting on the runtime for one component
struct RuntimeHost<'r> {
    runtime: &'r mut ComponentRuntime,
    component_id: &'r str,
}

impl<'r> RuntimeHost<'r> {
    fn resolve<'t>(&'t self, target: &'t str) -> &'t str {
        match target {
            "" | "self" => self.component_id,
            other => other,
        }
    }

    fn instance_mut(&mut self, target: &str) -> Option<&mut ComponentInstance> {
        let id = self.resolve(target).to_string();
        let instance = self.runtime.instances.get_mut(&id);
        if instance.is_none() {
            warn!(target = %id, "Instruction targets an unknown component");
        }
        instance
    }
}

impl InstructionHost for RuntimeHost<'_> {
    fn get_value(&self, target: &str) -> Option<Value> {
        self.runtime
            .connection_value(self.resolve(target), "value")
    }

    fn set_value(&mut self, target: &str, value: Value) {
        if let Some(instance) = self.instance_mut(target) {
            instance.state.insert("value".to_string(), value);
        }
    }

    fn set_style(&mut self, target: &str, property: &str, value: Value) {
        if let Some(instance) = self.instance_mut(target) {
            instance.styles.insert(property.to_string(), value);
        }
    }

    fn set_property(&mut self, target: &str, property: &str, value: Value) {
        if let Some(instance) = self.instance_mut(target) {
            instance.properties.insert(property.to_string(), value);
        }
    }

    fn dispatch(&mut self, action: StateAction) {
        self.runtime.dispatched.push(action);
    }

    fn emit(&mut self, connection: &str, value: Value) {
        self.runtime.outbox.push_back(Pending {
            component_id: self.component_id.to_string(),
            point: connection.to_string(),
            value,
        });
    }
}
