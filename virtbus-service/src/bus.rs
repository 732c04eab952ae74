//! In-process bus router: resolves a method call to its object and handler.

use serde::{Deserialize, Serialize};
use virtbus_core::ObjectPath;

use crate::{
    connect::ConnectObject,
    context::ServiceContext,
    dispatcher::signature_of,
    domain::DomainObject,
    error::BusFault,
    interface::{self, Handler, InterfaceSpec, PropertiesMethod},
    value::{conforms, Value},
};

/// A method call addressed to an exported object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub path: ObjectPath,
    pub interface: String,
    pub member: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl MethodCall {
    pub fn new(path: ObjectPath, interface: &str, member: &str, args: Vec<Value>) -> Self {
        Self { path, interface: interface.to_owned(), member: member.to_owned(), args }
    }
}

/// Routes [`MethodCall`]s through the interface table.
#[derive(Debug, Clone)]
pub struct Bus {
    ctx: ServiceContext,
}

impl Bus {
    #[must_use]
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    #[must_use]
    pub fn context(&self) -> &ServiceContext {
        &self.ctx
    }

    /// Interfaces exported at `path`.
    ///
    /// # Errors
    /// Returns [`BusFault::UnknownObject`] if nothing is exported there.
    pub fn introspect(&self, path: &ObjectPath) -> Result<&'static [&'static InterfaceSpec], BusFault> {
        if !self.is_exported(path) {
            return Err(BusFault::UnknownObject(path.to_string()));
        }
        Ok(interface::interfaces_at(path))
    }

    /// Dispatch one call and return its reply, `None` for methods without
    /// output.
    ///
    /// # Errors
    /// Returns [`BusFault::UnknownObject`], [`BusFault::UnknownMethod`] or
    /// [`BusFault::InvalidArgs`] for calls the table rejects, otherwise the
    /// handler's own fault.
    pub async fn call(&self, call: &MethodCall) -> Result<Option<Value>, BusFault> {
        tracing::debug!(path = %call.path, interface = %call.interface, member = %call.member, "bus call");
        let interfaces = self.introspect(&call.path)?;
        let unknown = || BusFault::UnknownMethod { interface: call.interface.clone(), member: call.member.clone() };
        let method_spec = interfaces
            .iter()
            .find(|i| i.name == call.interface)
            .and_then(|i| i.method(&call.member))
            .ok_or_else(unknown)?;

        let matches = method_spec.inputs.len() == call.args.len()
            && method_spec.inputs.iter().zip(&call.args).all(|(arg, value)| conforms(value, arg.signature));
        if !matches {
            return Err(BusFault::InvalidArgs(format!(
                "{}.{} expects '{}', got '{}'",
                call.interface,
                call.member,
                method_spec.input_signature(),
                signature_of(&call.args)
            )));
        }

        match method_spec.handler {
            Handler::Connect(method) => ConnectObject::new(self.ctx.clone()).invoke(method, &call.args).await.map(Some),
            Handler::Domain(method) => DomainObject::at(&self.ctx, &call.path)?.invoke(method, &call.args).await,
            Handler::Properties(method) => self.properties(call, interfaces, method).await,
        }
    }

    async fn properties(
        &self,
        call: &MethodCall,
        interfaces: &[&InterfaceSpec],
        method: PropertiesMethod,
    ) -> Result<Option<Value>, BusFault> {
        let Some(Value::String(target)) = call.args.first() else {
            return Err(BusFault::InvalidArgs("missing interface name".to_owned()));
        };
        let iface = interfaces
            .iter()
            .find(|i| i.name == target.as_str())
            .ok_or_else(|| BusFault::InvalidArgs(format!("no interface '{target}' at '{}'", call.path)))?;
        let object = DomainObject::at(&self.ctx, &call.path)?;

        if method == PropertiesMethod::GetAll {
            if iface.properties.is_empty() {
                return Ok(Some(Value::Dict(indexmap::IndexMap::new())));
            }
            return Ok(Some(Value::Dict(object.get_all_properties().await?)));
        }

        let name = call.args.get(1).and_then(Value::as_str).unwrap_or_default();
        let property = iface.property(name).ok_or_else(|| BusFault::UnknownProperty {
            interface: iface.name.to_owned(),
            property: name.to_owned(),
        })?;
        match (method, call.args.get(2)) {
            (PropertiesMethod::Set, Some(value)) => {
                object.set_property(property.property, value).await?;
                Ok(None)
            }
            _ => Ok(Some(object.get_property(property.property).await?)),
        }
    }

    fn is_exported(&self, path: &ObjectPath) -> bool {
        path.as_str() == virtbus_core::CONNECT_PATH || self.ctx.directory.uuid_for_path(path).is_some()
    }
}
