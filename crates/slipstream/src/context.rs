use {
    crate::swap::SwapAdapter,
    solana_pubkey::Pubkey,
    solana_pubsub_client::nonblocking::pubsub_client::PubsubClient,
    solana_rpc_client::nonblocking::rpc_client::RpcClient,
    std::sync::Arc,
};

/// Everything a node compile may consult. Handles are shared; the context
/// itself is cheap to clone per compilation.
#[derive(Clone)]
pub struct CompileContext {
    signer: Pubkey,
    wallet: Pubkey,
    rpc: Arc<RpcClient>,
    pubsub: Option<Arc<PubsubClient>>,
    swap_adapter: Option<Arc<dyn SwapAdapter>>,
}

impl CompileContext {
    pub fn new(signer: Pubkey, wallet: Pubkey, rpc: Arc<RpcClient>) -> Self {
        Self {
            signer,
            wallet,
            rpc,
            pubsub: None,
            swap_adapter: None,
        }
    }

    pub fn with_pubsub(mut self, pubsub: Arc<PubsubClient>) -> Self {
        self.pubsub = Some(pubsub);
        self
    }

    pub fn with_swap_adapter(mut self, adapter: Arc<dyn SwapAdapter>) -> Self {
        self.swap_adapter = Some(adapter);
        self
    }

    pub fn signer(&self) -> &Pubkey {
        &self.signer
    }

    pub fn wallet(&self) -> &Pubkey {
        &self.wallet
    }

    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    pub fn rpc_arc(&self) -> Arc<RpcClient> {
        self.rpc.clone()
    }

    pub fn pubsub(&self) -> Option<&Arc<PubsubClient>> {
        self.pubsub.as_ref()
    }

    pub fn swap_adapter(&self) -> Option<&Arc<dyn SwapAdapter>> {
        self.swap_adapter.as_ref()
    }
}
