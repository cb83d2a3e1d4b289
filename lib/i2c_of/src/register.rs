//! Creating clients from nodes and tearing them down again.
use crate::{
    I2cOf,
    device::{AdapterHandle, ClientHandle},
    error::I2cOfError,
    registry::{AdapterDesc, RegistryError},
};
use dt::node::{NodeFlags, NodeHandle};
use log::error;
use utils::debug_ex;

impl I2cOf {
    /// Create the client described by `node` on `adapter`, without claiming the node.
    fn register_device(
        &self,
        adapter: &AdapterHandle,
        node: &NodeHandle,
    ) -> Result<ClientHandle, I2cOfError> {
        debug_ex!("of_i2c: register {} on {}", node, adapter.name);

        let info = self.get_board_info(node)?;
        self.registry.new_client(adapter, &info).map_err(|err| {
            error!("of_i2c: Failure registering {}: {}", node, err);
            I2cOfError::RegistrationFailed(err)
        })
    }

    /// Claim `node` and create its client on `adapter`.
    ///
    /// Returns [I2cOfError::AlreadyClaimed] if the node was claimed before, whether by a bulk
    /// walk or a tree event. Any other failure releases the claim so that a later attempt may
    /// proceed.
    pub fn claim_and_register(
        &self,
        adapter: &AdapterHandle,
        node: &NodeHandle,
    ) -> Result<ClientHandle, I2cOfError> {
        if node.test_and_set_flag(NodeFlags::POPULATED) {
            return Err(I2cOfError::AlreadyClaimed);
        }
        self.register_device(adapter, node).inspect_err(|_| {
            node.clear_flag(NodeFlags::POPULATED);
        })
    }

    /// Create clients for the enabled children of the adapter's node, or of its bus container
    /// child when it has one. Nodes already claimed are skipped; a failing node is logged and
    /// the walk goes on. Returns the number of clients created.
    pub fn register_children(&self, adapter: &AdapterHandle) -> usize {
        // Only register child devices if the adapter has a node pointer set
        let Some(adapter_node) = adapter.of_node.as_ref() else {
            return 0;
        };

        debug_ex!("of_i2c: walking child nodes of {}", adapter_node);

        let bus = adapter_node
            .child_by_name(&self.config.bus_node_name)
            .unwrap_or_else(|| adapter_node.clone());

        let mut created = 0;
        for node in bus.available_children() {
            match self.claim_and_register(adapter, &node) {
                Ok(_) => created += 1,
                Err(I2cOfError::AlreadyClaimed) => continue,
                Err(err) => error!(
                    "{}: Failed to create I2C device for {}: {}",
                    adapter.name, node, err
                ),
            }
        }
        created
    }

    /// Unregister `client` and release its node's claim.
    pub fn unregister_client(&self, client: &ClientHandle) -> Result<(), I2cOfError> {
        self.registry.unregister(client).map_err(|err| match err {
            RegistryError::NotRegistered => I2cOfError::NotFound,
            other => I2cOfError::RegistrationFailed(other),
        })?;
        if let Some(node) = client.of_node.as_ref() {
            node.clear_flag(NodeFlags::POPULATED);
        }
        debug_ex!("of_i2c: unregistered {}", client.name);
        Ok(())
    }

    /// Register an adapter and populate it from its node.
    pub fn add_adapter(&self, desc: AdapterDesc) -> Result<AdapterHandle, I2cOfError> {
        let adapter = self
            .registry
            .add_adapter(desc)
            .map_err(I2cOfError::RegistrationFailed)?;
        self.register_children(&adapter);
        Ok(adapter)
    }

    /// Unregister every client of `adapter`, then the adapter itself.
    pub fn del_adapter(&self, adapter: &AdapterHandle) -> Result<(), I2cOfError> {
        for client in self
            .registry
            .devices()
            .into_iter()
            .filter_map(ClientHandle::verify)
            .filter(|c| c.parent.as_ref().is_some_and(|p| p.is(adapter)))
        {
            self.unregister_client(&client)?;
        }
        self.registry.unregister(adapter).map_err(|_| I2cOfError::NotFound)
    }
}
