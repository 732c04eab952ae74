//! Domain definitions and their XML rendering.

use serde::{Deserialize, Serialize};
use virtbus_core::{DomainUuid, SchedulerType};

/// Stored configuration of a domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct DomainDefinition {
    /// Unique domain name.
    pub name: String,

    /// Immutable identity.
    pub uuid: DomainUuid,

    /// vCPUs online at boot.
    pub vcpus: u32,

    /// Upper bound for hot-plugged vCPUs.
    pub max_vcpus: u32,

    /// Memory size in kibibytes.
    pub memory_kib: u64,

    /// Guest OS type (e.g. `hvm`); may be empty.
    pub os_type: String,

    /// Scheduler reported for this domain.
    pub scheduler: SchedulerType,
}

impl DomainDefinition {
    /// Create a minimal definition with a random UUID and defaults.
    ///
    /// # Arguments
    /// - `name`: domain name, unique per connection
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uuid: DomainUuid::new_v4(),
            vcpus: 1,
            max_vcpus: 1,
            memory_kib: 131_072,
            os_type: "hvm".to_owned(),
            scheduler: SchedulerType::new("fair", 1),
        }
    }

    /// Set a fixed UUID.
    #[must_use]
    pub fn with_uuid(mut self, uuid: DomainUuid) -> Self {
        self.uuid = uuid;
        self
    }

    /// Set the boot and maximum vCPU counts.
    #[must_use]
    pub fn with_vcpus(mut self, vcpus: u32, max_vcpus: u32) -> Self {
        self.vcpus = vcpus;
        self.max_vcpus = max_vcpus.max(vcpus);
        self
    }

    /// Set the guest OS type.
    #[must_use]
    pub fn with_os_type(mut self, os_type: impl Into<String>) -> Self {
        self.os_type = os_type.into();
        self
    }

    /// Render the domain XML descriptor.
    ///
    /// `id` is emitted as an attribute only for running domains; pass `None`
    /// for the inactive configuration.
    #[must_use]
    pub fn to_xml(&self, id: Option<u32>) -> String {
        let id_attr = id.map(|id| format!(" id='{id}'")).unwrap_or_default();
        let os_type = if self.os_type.is_empty() {
            String::new()
        } else {
            format!("    <type arch='x86_64'>{}</type>\n", escape(&self.os_type))
        };
        format!(
            "<domain type='test'{id_attr}>\n\
             \x20 <name>{name}</name>\n\
             \x20 <uuid>{uuid}</uuid>\n\
             \x20 <memory unit='KiB'>{memory}</memory>\n\
             \x20 <currentMemory unit='KiB'>{memory}</currentMemory>\n\
             \x20 <vcpu placement='static' current='{vcpus}'>{max_vcpus}</vcpu>\n\
             \x20 <os>\n\
             {os_type}\
             \x20   <boot dev='hd'/>\n\
             \x20 </os>\n\
             \x20 <on_poweroff>destroy</on_poweroff>\n\
             \x20 <on_reboot>restart</on_reboot>\n\
             \x20 <on_crash>destroy</on_crash>\n\
             </domain>\n",
            name = escape(&self.name),
            uuid = self.uuid,
            memory = self.memory_kib,
            vcpus = self.vcpus,
            max_vcpus = self.max_vcpus,
        )
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '\'' => out.push_str("&apos;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xml_includes_id_only_when_running() {
        let def = DomainDefinition::new("vm1");
        let live = def.to_xml(Some(3));
        assert!(live.starts_with("<domain type='test' id='3'>"), "{live}");
        let inactive = def.to_xml(None);
        assert!(!inactive.contains("id="), "{inactive}");
        assert!(inactive.contains(&format!("<uuid>{}</uuid>", def.uuid)));
    }

    #[test]
    fn xml_escapes_name() {
        let xml = DomainDefinition::new("a<b&c").to_xml(None);
        assert!(xml.contains("<name>a&lt;b&amp;c</name>"), "{xml}");
    }

    #[test]
    fn empty_os_type_omits_type_element() {
        let xml = DomainDefinition::new("bare").with_os_type("").to_xml(None);
        assert!(!xml.contains("<type"), "{xml}");
    }

    #[test]
    fn xml_layout_is_indented_per_element() {
        let xml = DomainDefinition::new("vm").with_vcpus(2, 4).to_xml(Some(1));
        assert!(xml.contains("\n  <vcpu placement='static' current='2'>4</vcpu>\n"), "{xml}");
        assert!(xml.contains("\n  <os>\n    <type arch='x86_64'>hvm</type>\n    <boot dev='hd'/>\n  </os>\n"), "{xml}");
        assert!(xml.ends_with("  <on_crash>destroy</on_crash>\n</domain>\n"), "{xml}");
    }

    #[test]
    fn max_vcpus_never_below_current() {
        let def = DomainDefinition::new("vm").with_vcpus(4, 2);
        assert_eq!(def.max_vcpus, 4);
    }
}
