#![allow(dead_code)]

use beacon_rpc::{
    BoxMessage, Completion, MemStore, MethodDescriptor, MsgpCodec, ProviderConfig, ProviderHandle,
    RpcChannel, RpcController, RpcProvider, Service, ServiceDescriptor,
};
use captains_log::recipe;
use log::Level;
use serde_derive::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub fn setup_log() {
    recipe::raw_file_logger("/tmp/beacon_rpc_test.log", Level::Trace).test().build().expect("log");
}

#[derive(Default, Serialize, Deserialize, PartialEq, Debug)]
pub struct LoginRequest {
    pub name: String,
    pub pwd: String,
}

#[derive(Default, Serialize, Deserialize, PartialEq, Debug)]
pub struct LoginResponse {
    pub success: bool,
    pub err: String,
}

#[derive(Default, Serialize, Deserialize)]
pub struct NapRequest {
    pub ms: u64,
}

#[derive(Default, Serialize, Deserialize)]
pub struct NapResponse {
    pub woke: bool,
}

#[derive(Default, Serialize, Deserialize)]
pub struct FetchRequest {
    pub size: u32,
}

#[derive(Default, Serialize, Deserialize)]
pub struct FetchResponse {
    pub data: Vec<u8>,
}

/// `User.Login`: succeeds when the password is `"pw"`.
pub struct UserService;

impl Service<MsgpCodec> for UserService {
    fn descriptor(&self) -> ServiceDescriptor<MsgpCodec> {
        ServiceDescriptor::new("User").with_method::<LoginRequest, LoginResponse>("Login")
    }

    fn call_method(
        &self, _method: &MethodDescriptor<MsgpCodec>, _controller: Option<&mut RpcController>,
        request: BoxMessage<MsgpCodec>, mut response: BoxMessage<MsgpCodec>,
        done: Completion<MsgpCodec>,
    ) {
        let req = request.as_any().downcast_ref::<LoginRequest>().unwrap();
        let resp = response.as_any_mut().downcast_mut::<LoginResponse>().unwrap();
        if req.pwd == "pw" {
            resp.success = true;
        } else {
            resp.success = false;
            resp.err = "bad password".to_string();
        }
        done.run(response);
    }
}

/// `Sleep.Nap`: sleeps for the requested milliseconds before answering.
pub struct SleepService;

impl Service<MsgpCodec> for SleepService {
    fn descriptor(&self) -> ServiceDescriptor<MsgpCodec> {
        ServiceDescriptor::new("Sleep").with_method::<NapRequest, NapResponse>("Nap")
    }

    fn call_method(
        &self, _method: &MethodDescriptor<MsgpCodec>, _controller: Option<&mut RpcController>,
        request: BoxMessage<MsgpCodec>, mut response: BoxMessage<MsgpCodec>,
        done: Completion<MsgpCodec>,
    ) {
        let req = request.as_any().downcast_ref::<NapRequest>().unwrap();
        thread::sleep(Duration::from_millis(req.ms));
        response.as_any_mut().downcast_mut::<NapResponse>().unwrap().woke = true;
        done.run(response);
    }
}

/// `Blob.Fetch`: answers with `size` filler bytes.
pub struct BlobService;

impl Service<MsgpCodec> for BlobService {
    fn descriptor(&self) -> ServiceDescriptor<MsgpCodec> {
        ServiceDescriptor::new("Blob").with_method::<FetchRequest, FetchResponse>("Fetch")
    }

    fn call_method(
        &self, _method: &MethodDescriptor<MsgpCodec>, _controller: Option<&mut RpcController>,
        request: BoxMessage<MsgpCodec>, mut response: BoxMessage<MsgpCodec>,
        done: Completion<MsgpCodec>,
    ) {
        let req = request.as_any().downcast_ref::<FetchRequest>().unwrap();
        response.as_any_mut().downcast_mut::<FetchResponse>().unwrap().data =
            vec![0xAB; req.size as usize];
        done.run(response);
    }
}

/// Start a provider hosting all three test services on 127.0.0.1.
pub fn start_provider(store: &Arc<MemStore>, workers: usize, port: u16) -> ProviderHandle {
    let mut config = ProviderConfig::default();
    config.workers = workers;
    config.port = port;
    let mut provider = RpcProvider::new(config, store.clone());
    provider.notify_service(Arc::new(UserService));
    provider.notify_service(Arc::new(SleepService));
    provider.notify_service(Arc::new(BlobService));
    provider.start().expect("provider start")
}

/// Client-side view of the `User` service; `Logout` exists here but is never
/// registered by the provider.
pub fn user_descriptor() -> ServiceDescriptor<MsgpCodec> {
    ServiceDescriptor::new("User")
        .with_method::<LoginRequest, LoginResponse>("Login")
        .with_method::<LoginRequest, LoginResponse>("Logout")
}

pub fn sleep_descriptor() -> ServiceDescriptor<MsgpCodec> {
    ServiceDescriptor::new("Sleep").with_method::<NapRequest, NapResponse>("Nap")
}

pub fn blob_descriptor() -> ServiceDescriptor<MsgpCodec> {
    ServiceDescriptor::new("Blob").with_method::<FetchRequest, FetchResponse>("Fetch")
}

pub fn login(
    channel: &RpcChannel<MsgpCodec, MemStore>, controller: &mut RpcController, name: &str,
    pwd: &str,
) -> LoginResponse {
    let descriptor = user_descriptor();
    let request = LoginRequest { name: name.to_string(), pwd: pwd.to_string() };
    let mut response = LoginResponse::default();
    channel.call_method(
        descriptor.method("Login").unwrap(),
        controller,
        &request,
        &mut response,
        None,
    );
    response
}
