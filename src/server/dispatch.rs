use crate::codec::Codec;
use crate::error::RpcFault;
use crate::proto::RequestFrame;
use crate::registry::ServiceRegistry;
use crate::service::{BoxMessage, Completion};
use log::*;
use std::sync::Arc;

/// Receives the serialized response payload of one dispatched call; the
/// provider wires it to a framed socket write.
pub type ResponseSink = Box<dyn FnOnce(Vec<u8>) + Send + 'static>;

/// Route one parsed frame: find the method, build the containers, decode the
/// args, invoke the handler with a write-back completion.
///
/// `Err` is the terminal "drop this connection" signal; after `Ok(())` the
/// response travels through `sink` whenever the handler completes.
pub fn dispatch_frame<C: Codec>(
    codec: &Arc<C>, registry: &ServiceRegistry<C>, frame: RequestFrame, sink: ResponseSink,
) -> Result<(), RpcFault> {
    let RequestFrame { header, args } = frame;
    let Some((handle, method)) = registry.lookup(&header.service_name, &header.method_name) else {
        error!("{}.{} is not exist!", header.service_name, header.method_name);
        if registry.has_service(&header.service_name) {
            return Err(RpcFault::Method);
        }
        return Err(RpcFault::Service);
    };

    let mut request = method.new_request();
    // zero args means "keep the default request container"
    if !args.is_empty() {
        if request.merge_from(codec.as_ref(), &args).is_err() {
            error!("{}.{} request parse error", header.service_name, header.method_name);
            return Err(RpcFault::Decode);
        }
    }
    let response = method.new_response();

    let codec = codec.clone();
    let done = Completion::new(move |resp: BoxMessage<C>| match resp.encode(codec.as_ref()) {
        Ok(payload) => sink(payload),
        Err(()) => error!("serialize response error!"),
    });

    handle.call_method(&method, None, request, response, done);
    Ok(())
}
