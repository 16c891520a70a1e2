use std::sync::Arc;

use crate::store::EntityStore;


/// The context that is accessible to every resolver in our API.
pub(crate) struct Context {
    pub(crate) store: Arc<dyn EntityStore>,
}

impl juniper::Context for Context {}
