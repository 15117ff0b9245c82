//! Installing a client into a host application object.
//!
//! A host exposes two slots: a static one (shared, reachable without an
//! instance) and an instance one (handed to every instance the host
//! creates). `Client::install` applies an optional setup first, then fills
//! both slots with clones of the configured client.

use crate::client::Client;
use crate::config::Setup;
use crate::error::Error;

pub trait Host {
    fn attach_static(&mut self, client: Client);
    fn attach_instance(&mut self, client: Client);
}

impl Client {
    /// Configure with `setup` (if any) and attach to `host`.
    ///
    /// On a configuration error the host is left untouched.
    pub fn install<H: Host + ?Sized>(
        mut self,
        host: &mut H,
        setup: Option<Setup>,
    ) -> Result<Client, Error> {
        if let Some(setup) = setup {
            self.configure(setup)?;
        }
        host.attach_static(self.clone());
        host.attach_instance(self.clone());
        tracing::debug!(root = %self.config().options().root, "client installed");
        Ok(self)
    }
}
