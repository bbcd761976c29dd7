use crate::codec::Codec;
use crate::controller::RpcController;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::sync::Arc;

/// Object-safe view of a serializable message, so the wire layer can move
/// request and response containers around without knowing their types.
///
/// Blanket-implemented for every serde type; user code never implements this
/// by hand, it only downcasts through [as_any](Self::as_any).
pub trait AnyMessage<C: Codec>: Send + 'static {
    fn encode(&self, codec: &C) -> Result<Vec<u8>, ()>;

    /// Replace self with the decoded content of `buf`.
    fn merge_from(&mut self, codec: &C, buf: &[u8]) -> Result<(), ()>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<C, T> AnyMessage<C> for T
where
    C: Codec,
    T: Serialize + DeserializeOwned + Send + 'static,
{
    #[inline(always)]
    fn encode(&self, codec: &C) -> Result<Vec<u8>, ()> {
        codec.encode(self)
    }

    #[inline(always)]
    fn merge_from(&mut self, codec: &C, buf: &[u8]) -> Result<(), ()> {
        *self = codec.decode(buf)?;
        Ok(())
    }

    #[inline(always)]
    fn as_any(&self) -> &dyn Any {
        self
    }

    #[inline(always)]
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub type BoxMessage<C> = Box<dyn AnyMessage<C>>;

/// One entry point of a service: its names plus factories producing fresh
/// empty request and response containers.
pub struct MethodDescriptor<C: Codec> {
    service_name: &'static str,
    name: &'static str,
    make_request: fn() -> BoxMessage<C>,
    make_response: fn() -> BoxMessage<C>,
}

impl<C: Codec> MethodDescriptor<C> {
    #[inline]
    pub fn service_name(&self) -> &'static str {
        self.service_name
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Fresh empty request container.
    #[inline]
    pub fn new_request(&self) -> BoxMessage<C> {
        (self.make_request)()
    }

    /// Fresh empty response container.
    #[inline]
    pub fn new_response(&self) -> BoxMessage<C> {
        (self.make_response)()
    }
}

fn boxed_default<C, T>() -> BoxMessage<C>
where
    C: Codec,
    T: Default + Serialize + DeserializeOwned + Send + 'static,
{
    Box::new(T::default())
}

/// Name and method list of a service.
///
/// Built by hand (or by whatever schema tooling the embedding crate uses);
/// the framework only reads it.
pub struct ServiceDescriptor<C: Codec> {
    name: &'static str,
    methods: Vec<Arc<MethodDescriptor<C>>>,
}

impl<C: Codec> ServiceDescriptor<C> {
    pub fn new(name: &'static str) -> Self {
        Self { name, methods: Vec::new() }
    }

    /// Append a method typed by its request and response containers.
    pub fn with_method<Req, Resp>(mut self, name: &'static str) -> Self
    where
        Req: Default + Serialize + DeserializeOwned + Send + 'static,
        Resp: Default + Serialize + DeserializeOwned + Send + 'static,
    {
        self.methods.push(Arc::new(MethodDescriptor {
            service_name: self.name,
            name,
            make_request: boxed_default::<C, Req>,
            make_response: boxed_default::<C, Resp>,
        }));
        self
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn methods(&self) -> &[Arc<MethodDescriptor<C>>] {
        &self.methods
    }

    pub fn method(&self, name: &str) -> Option<&Arc<MethodDescriptor<C>>> {
        self.methods.iter().find(|m| m.name() == name)
    }
}

/// One-shot continuation handed to a service handler.
///
/// The handler must call [run](Self::run) exactly once with the filled
/// response; move semantics make a second invocation impossible, and dropping
/// the completion without running it loses the response (the peer sees the
/// call fail), which is a bug in the handler, not in the framework.
pub struct Completion<C: Codec> {
    done: Box<dyn FnOnce(BoxMessage<C>) + Send + 'static>,
}

impl<C: Codec> Completion<C> {
    pub(crate) fn new<F: FnOnce(BoxMessage<C>) + Send + 'static>(done: F) -> Self {
        Self { done: Box::new(done) }
    }

    /// Hand the response back to the framework for serialization and send.
    #[inline]
    pub fn run(self, response: BoxMessage<C>) {
        (self.done)(response)
    }
}

/// A service handle hosted by a provider.
///
/// `call_method` routes to the user implementation; the controller is `None`
/// on the provider side (the server does not consume one).
pub trait Service<C: Codec>: Send + Sync + 'static {
    fn descriptor(&self) -> ServiceDescriptor<C>;

    fn call_method(
        &self, method: &MethodDescriptor<C>, controller: Option<&mut RpcController>,
        request: BoxMessage<C>, response: BoxMessage<C>, done: Completion<C>,
    );
}
