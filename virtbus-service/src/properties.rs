//! Property projection for `org.libvirt.Domain`.
//!
//! Every read is a fresh hypervisor query; nothing is cached.

use indexmap::IndexMap;
use virtbus_core::DomainId;

use crate::{domain::DomainObject, error::BusFault, interface::DOMAIN_INTERFACE, value::Value};

/// Properties of `org.libvirt.Domain`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    Active,
    Autostart,
    Id,
    Name,
    OsType,
    Persistent,
    SchedulerType,
    State,
    Uuid,
}

impl Property {
    /// Every property, in the order `GetAll` reports them.
    pub const ALL: [Self; 9] = [
        Self::Active,
        Self::Autostart,
        Self::Id,
        Self::Name,
        Self::OsType,
        Self::Persistent,
        Self::SchedulerType,
        Self::State,
        Self::Uuid,
    ];

    /// Bus-visible property name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Autostart => "Autostart",
            Self::Id => "Id",
            Self::Name => "Name",
            Self::OsType => "OSType",
            Self::Persistent => "Persistent",
            Self::SchedulerType => "SchedulerType",
            Self::State => "State",
            Self::Uuid => "UUID",
        }
    }

    #[must_use]
    pub fn signature(self) -> &'static str {
        match self {
            Self::Active | Self::Autostart | Self::Persistent => "b",
            Self::Id => "u",
            Self::Name | Self::OsType | Self::State | Self::Uuid => "s",
            Self::SchedulerType => "(si)",
        }
    }

    /// Whether the projector accepts writes for this property.
    #[must_use]
    pub fn is_writable(self) -> bool {
        matches!(self, Self::Autostart)
    }
}

impl DomainObject {
    /// Read one property.
    ///
    /// # Errors
    /// Returns [`BusFault::NotFound`] if the domain vanished.
    pub async fn get_property(&self, property: Property) -> Result<Value, BusFault> {
        let hv = self.hypervisor();
        let dom = self.handle().await?;
        let value = match property {
            Property::Active => Value::from(hv.is_active(&dom).await?),
            Property::Autostart => Value::from(hv.autostart(&dom).await?),
            Property::Id => Value::from(DomainId::from_running(hv.id(&dom).await?).value()),
            Property::Name => Value::from(hv.name(&dom).await?),
            Property::OsType => Value::from(hv.os_type(&dom).await?),
            Property::Persistent => Value::from(hv.is_persistent(&dom).await?),
            Property::SchedulerType => Value::from(hv.scheduler_type(&dom).await?),
            Property::State => {
                let (state, _reason) = hv.state(&dom).await?;
                Value::from(state.as_str())
            }
            Property::Uuid => Value::from(dom.uuid.to_string()),
        };
        Ok(value)
    }

    /// Read every property, keyed by name.
    ///
    /// # Errors
    /// Fails on the first property that cannot be read.
    pub async fn get_all_properties(&self) -> Result<IndexMap<String, Value>, BusFault> {
        let mut all = IndexMap::with_capacity(Property::ALL.len());
        for property in Property::ALL {
            all.insert(property.name().to_owned(), self.get_property(property).await?);
        }
        Ok(all)
    }

    /// Write one property.
    ///
    /// # Errors
    /// Returns [`BusFault::ReadOnlyProperty`] for computed properties,
    /// [`BusFault::InvalidArgs`] if `value` has the wrong type, and
    /// [`BusFault::InvalidState`] if the hypervisor refuses the change.
    pub async fn set_property(&self, property: Property, value: &Value) -> Result<(), BusFault> {
        if !property.is_writable() {
            return Err(BusFault::ReadOnlyProperty {
                interface: DOMAIN_INTERFACE.to_owned(),
                property: property.name().to_owned(),
            });
        }
        let enabled = value.as_bool().ok_or_else(|| {
            BusFault::InvalidArgs(format!(
                "property '{}' expects '{}', got '{}'",
                property.name(),
                property.signature(),
                value.signature()
            ))
        })?;
        let dom = self.handle().await?;
        self.hypervisor().set_autostart(&dom, enabled).await?;
        tracing::info!(path = %self.path(), autostart = enabled, "autostart updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use virtbus_core::{DomainUuid, ObjectPath};
    use virtbus_driver::{test_driver::DEFAULT_DOMAIN_UUID, DomainDefinition};

    use super::*;
    use crate::context::testing::default_context;

    fn default_uuid() -> DomainUuid {
        match DomainUuid::parse(DEFAULT_DOMAIN_UUID) {
            Ok(u) => u,
            Err(e) => panic!("bad uuid: {e}"),
        }
    }

    async fn get(obj: &DomainObject, property: Property) -> Value {
        match obj.get_property(property).await {
            Ok(v) => v,
            Err(e) => panic!("get {} failed: {e}", property.name()),
        }
    }

    #[tokio::test]
    async fn get_all_has_every_property_with_its_type() {
        let (ctx, _) = default_context();
        let obj = DomainObject::export(&ctx, default_uuid());
        let all = match obj.get_all_properties().await {
            Ok(a) => a,
            Err(e) => panic!("get_all failed: {e}"),
        };
        let names: Vec<&str> = all.keys().map(String::as_str).collect();
        assert_eq!(
            names,
            ["Active", "Autostart", "Id", "Name", "OSType", "Persistent", "SchedulerType", "State", "UUID"]
        );
        for property in Property::ALL {
            assert_eq!(all[property.name()].signature(), property.signature(), "{}", property.name());
        }
        assert_eq!(all["Name"].as_str(), Some("test"));
        assert_eq!(all["UUID"].as_str(), Some(DEFAULT_DOMAIN_UUID));
        assert_eq!(all["State"].as_str(), Some("running"));
        assert_eq!(all["Id"].as_u32(), Some(1));
    }

    #[tokio::test]
    async fn inactive_domain_reports_invalid_id() {
        let (ctx, driver) = default_context();
        let dom = match driver.define(DomainDefinition::new("idle")).await {
            Ok(d) => d,
            Err(e) => panic!("define failed: {e}"),
        };
        let obj = DomainObject::export(&ctx, dom.uuid);
        assert_eq!(get(&obj, Property::Id).await.as_u32(), Some(u32::MAX));
        assert_eq!(get(&obj, Property::Active).await.as_bool(), Some(false));
        assert_eq!(get(&obj, Property::State).await.as_str(), Some("shutoff"));
    }

    #[tokio::test]
    async fn autostart_round_trips() {
        let (ctx, _) = default_context();
        let obj = DomainObject::export(&ctx, default_uuid());
        for expected in [true, false] {
            if let Err(e) = obj.set_property(Property::Autostart, &Value::Bool(expected)).await {
                panic!("set failed: {e}");
            }
            assert_eq!(get(&obj, Property::Autostart).await.as_bool(), Some(expected));
        }
    }

    #[tokio::test]
    async fn computed_properties_are_read_only() {
        let (ctx, _) = default_context();
        let obj = DomainObject::export(&ctx, default_uuid());
        let err = obj.set_property(Property::Name, &Value::from("renamed")).await;
        assert!(matches!(err, Err(BusFault::ReadOnlyProperty { ref property, .. }) if property == "Name"));
    }

    #[tokio::test]
    async fn autostart_rejects_wrong_type() {
        let (ctx, _) = default_context();
        let obj = DomainObject::export(&ctx, default_uuid());
        let err = obj.set_property(Property::Autostart, &Value::U32(1)).await;
        assert!(matches!(err, Err(BusFault::InvalidArgs(_))));
    }

    #[tokio::test]
    async fn vanished_domain_read_is_not_found() {
        let (ctx, _) = default_context();
        let uuid = DomainUuid::new_v4();
        let obj = DomainObject::export(&ctx, uuid);
        assert_eq!(obj.path(), &ObjectPath::for_domain(uuid));
        assert!(matches!(obj.get_property(Property::Name).await, Err(BusFault::NotFound(_))));
    }
}
