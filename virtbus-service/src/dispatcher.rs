//! Lifecycle command dispatch for `org.libvirt.Domain`.
//!
//! Each method re-resolves the domain, performs exactly one hypervisor
//! operation and returns once the hypervisor accepted it. Lifecycle events
//! caused by the call arrive separately through the event bridge.

use crate::{domain::DomainObject, error::BusFault, value::Value};

/// Methods of `org.libvirt.Domain`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainMethod {
    GetXmlDesc,
    GetVcpus,
    Reboot,
    Shutdown,
    Create,
    Destroy,
    Reset,
    Undefine,
    Suspend,
    Resume,
    ManagedSave,
    ManagedSaveRemove,
    HasManagedSaveImage,
}

impl DomainObject {
    /// Current XML descriptor.
    ///
    /// # Errors
    /// Returns [`BusFault::NotFound`] if the domain was undefined concurrently.
    pub async fn get_xml_desc(&self, flags: u32) -> Result<String, BusFault> {
        let dom = self.handle().await?;
        Ok(self.hypervisor().xml_desc(&dom, flags).await?)
    }

    /// Current or maximum vCPU count, per `flags`.
    ///
    /// # Errors
    /// Returns [`BusFault::InvalidState`] when live values are requested for
    /// an inactive domain.
    pub async fn get_vcpus(&self, flags: u32) -> Result<u32, BusFault> {
        let dom = self.handle().await?;
        Ok(self.hypervisor().vcpus(&dom, flags).await?)
    }

    /// Request a reboot.
    ///
    /// # Errors
    /// Returns [`BusFault::InvalidState`] if the domain is not running.
    pub async fn reboot(&self, flags: u32) -> Result<(), BusFault> {
        let dom = self.handle().await?;
        self.hypervisor().reboot(&dom, flags).await?;
        tracing::info!(path = %self.path(), flags, "reboot requested");
        Ok(())
    }

    /// Request a graceful shutdown.
    ///
    /// # Errors
    /// Returns [`BusFault::InvalidState`] if the domain is not running.
    pub async fn shutdown(&self, flags: u32) -> Result<(), BusFault> {
        let dom = self.handle().await?;
        self.hypervisor().shutdown(&dom, flags).await?;
        tracing::info!(path = %self.path(), flags, "shutdown requested");
        Ok(())
    }

    /// Start the domain, restoring a managed save image when one exists.
    ///
    /// # Errors
    /// Returns [`BusFault::InvalidState`] if the domain is already running.
    pub async fn create(&self, flags: u32) -> Result<(), BusFault> {
        let dom = self.handle().await?;
        self.hypervisor().create(&dom, flags).await?;
        tracing::info!(path = %self.path(), flags, "domain started");
        Ok(())
    }

    /// Forcefully stop the domain.
    ///
    /// # Errors
    /// Returns [`BusFault::Unsupported`] when the driver lacks the operation.
    pub async fn destroy(&self, flags: u32) -> Result<(), BusFault> {
        let dom = self.handle().await?;
        self.hypervisor().destroy(&dom, flags).await?;
        tracing::info!(path = %self.path(), flags, "domain destroyed");
        Ok(())
    }

    /// Hard reset.
    ///
    /// # Errors
    /// Returns [`BusFault::Unsupported`] when the driver lacks the operation.
    pub async fn reset(&self, flags: u32) -> Result<(), BusFault> {
        let dom = self.handle().await?;
        self.hypervisor().reset(&dom, flags).await?;
        tracing::info!(path = %self.path(), flags, "domain reset");
        Ok(())
    }

    /// Remove the persistent definition. A running domain stays up as a
    /// transient one.
    ///
    /// # Errors
    /// Returns [`BusFault::InvalidState`] for transient domains, or while a
    /// managed save image exists and `flags` does not ask to remove it.
    pub async fn undefine(&self, flags: u32) -> Result<(), BusFault> {
        let dom = self.handle().await?;
        self.hypervisor().undefine(&dom, flags).await?;
        tracing::info!(path = %self.path(), flags, "domain undefined");
        Ok(())
    }

    /// Pause the domain.
    ///
    /// # Errors
    /// Returns [`BusFault::InvalidState`] unless the domain is running.
    pub async fn suspend(&self) -> Result<(), BusFault> {
        let dom = self.handle().await?;
        self.hypervisor().suspend(&dom).await?;
        tracing::info!(path = %self.path(), "domain suspended");
        Ok(())
    }

    /// Unpause the domain.
    ///
    /// # Errors
    /// Returns [`BusFault::InvalidState`] unless the domain is paused.
    pub async fn resume(&self) -> Result<(), BusFault> {
        let dom = self.handle().await?;
        self.hypervisor().resume(&dom).await?;
        tracing::info!(path = %self.path(), "domain resumed");
        Ok(())
    }

    /// Save the running state to a managed image and stop.
    ///
    /// # Errors
    /// Returns [`BusFault::InvalidState`] unless the domain is running and
    /// persistent.
    pub async fn managed_save(&self, flags: u32) -> Result<(), BusFault> {
        let dom = self.handle().await?;
        self.hypervisor().managed_save(&dom, flags).await?;
        tracing::info!(path = %self.path(), flags, "managed save image written");
        Ok(())
    }

    /// Discard the managed save image, if any.
    ///
    /// # Errors
    /// Returns [`BusFault::NotFound`] if the domain vanished.
    pub async fn managed_save_remove(&self, flags: u32) -> Result<(), BusFault> {
        let dom = self.handle().await?;
        self.hypervisor().managed_save_remove(&dom, flags).await?;
        tracing::info!(path = %self.path(), flags, "managed save image removed");
        Ok(())
    }

    /// Whether a managed save image exists.
    ///
    /// # Errors
    /// Returns [`BusFault::NotFound`] if the domain vanished.
    pub async fn has_managed_save_image(&self, flags: u32) -> Result<bool, BusFault> {
        let dom = self.handle().await?;
        Ok(self.hypervisor().has_managed_save_image(&dom, flags).await?)
    }

    /// Run `method` with bus arguments. Returns the reply value, if the
    /// method has one.
    ///
    /// # Errors
    /// Returns [`BusFault::InvalidArgs`] if `args` do not match the method,
    /// otherwise whatever the method itself returns.
    pub async fn invoke(&self, method: DomainMethod, args: &[Value]) -> Result<Option<Value>, BusFault> {
        let reply = match method {
            DomainMethod::GetXmlDesc => Some(Value::from(self.get_xml_desc(flags(args)?).await?)),
            DomainMethod::GetVcpus => Some(Value::from(self.get_vcpus(flags(args)?).await?)),
            DomainMethod::HasManagedSaveImage => {
                Some(Value::from(self.has_managed_save_image(flags(args)?).await?))
            }
            DomainMethod::Suspend => {
                no_args(args)?;
                self.suspend().await?;
                None
            }
            DomainMethod::Resume => {
                no_args(args)?;
                self.resume().await?;
                None
            }
            DomainMethod::Reboot => {
                self.reboot(flags(args)?).await?;
                None
            }
            DomainMethod::Shutdown => {
                self.shutdown(flags(args)?).await?;
                None
            }
            DomainMethod::Create => {
                self.create(flags(args)?).await?;
                None
            }
            DomainMethod::Destroy => {
                self.destroy(flags(args)?).await?;
                None
            }
            DomainMethod::Reset => {
                self.reset(flags(args)?).await?;
                None
            }
            DomainMethod::Undefine => {
                self.undefine(flags(args)?).await?;
                None
            }
            DomainMethod::ManagedSave => {
                self.managed_save(flags(args)?).await?;
                None
            }
            DomainMethod::ManagedSaveRemove => {
                self.managed_save_remove(flags(args)?).await?;
                None
            }
        };
        Ok(reply)
    }
}

/// The single `u` flags argument.
fn flags(args: &[Value]) -> Result<u32, BusFault> {
    match args {
        [Value::U32(flags)] => Ok(*flags),
        _ => Err(BusFault::InvalidArgs(format!("expected flags 'u', got '{}'", signature_of(args)))),
    }
}

fn no_args(args: &[Value]) -> Result<(), BusFault> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(BusFault::InvalidArgs(format!("expected no arguments, got '{}'", signature_of(args))))
    }
}

pub(crate) fn signature_of(args: &[Value]) -> String {
    args.iter().map(Value::signature).collect()
}
