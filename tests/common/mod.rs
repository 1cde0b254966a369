//! In-process fake of the grid processor.
//!
//! Keeps caches by name, hands out one stable handle per cache and records
//! every invocation and release so tests can count round trips.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gridwire::binary::{BinaryReader, BinaryWriter, TypeRegistry};
use gridwire::boundary::{Boundary, BoxFuture, Invocation, Response, Target};
use gridwire::memory::{InteropInputStream, InteropMemory, InteropOutputStream};
use gridwire::{ClusterGroupOp, Environment, GridwireError, Node, ProcessorOp, RemoteHandle, Result};

/// Code the fake answers `create_cache` on an existing cache with.
pub const CACHE_EXISTS: i32 = 17;

/// Code of injected failures.
pub const INJECTED: i32 = 99;

/// Encode a value the way the processor writes response payloads.
pub fn encode<F>(f: F) -> Vec<u8>
where
    F: FnOnce(&mut BinaryWriter<'_, '_>) -> Result<()>,
{
    let types = TypeRegistry::new();
    let mut mem = InteropMemory::with_capacity(64, 1 << 20).unwrap();
    let mut out = InteropOutputStream::new(&mut mem);
    f(&mut BinaryWriter::new(&mut out, &types)).unwrap();
    out.synchronize();
    mem.committed().to_vec()
}

/// Object-shaped response payload; 0 encodes "no object".
pub fn handle_payload(raw: u64) -> Vec<u8> {
    encode(|w| w.write_handle(RemoteHandle::new(raw)))
}

/// Decode the cache name of a request payload.
pub fn decode_name(payload: &[u8]) -> String {
    let mut input = InteropInputStream::new(payload);
    BinaryReader::new(&mut input).read_string().unwrap()
}

/// Which kind of target an invocation addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Addressed {
    Processor,
    Object,
}

#[derive(Default)]
struct State {
    next_handle: u64,
    caches: HashMap<String, u64>,
    singletons: HashMap<i32, u64>,
    compute: HashMap<u64, u64>,
    calls: HashMap<(Addressed, i32), usize>,
    failures: HashMap<(Addressed, i32), usize>,
    null_next: HashSet<(Addressed, i32)>,
    handed_out: Vec<u64>,
    released: Vec<u64>,
    names: Vec<String>,
}

impl State {
    fn handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn hand_out(&mut self, raw: u64) -> Response {
        self.handed_out.push(raw);
        Response::Object(RemoteHandle::new(raw))
    }
}

/// A [`Boundary`] answering from in-memory state.
pub struct FakeProcessor {
    state: Mutex<State>,
    delay: Duration,
}

impl FakeProcessor {
    pub fn new() -> Arc<Self> {
        Self::with_delay(Duration::ZERO)
    }

    /// Answer every invocation after `delay`.
    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                next_handle: 0x1000,
                ..State::default()
            }),
            delay,
        })
    }

    /// Build a node over this processor.
    pub fn node(self: &Arc<Self>) -> Node {
        let env = Environment::builder()
            .node_name("fake")
            .build(self.clone())
            .expect("valid default config");
        Node::new(env)
    }

    /// Fail the next `times` invocations of `op` with a remote fault.
    pub fn fail_next(&self, addressed: Addressed, op: i32, times: usize) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert((addressed, op), times);
    }

    /// Answer the next invocation of `op` with no object.
    pub fn null_next(&self, addressed: Addressed, op: i32) {
        self.state.lock().unwrap().null_next.insert((addressed, op));
    }

    /// Number of invocations of `op` seen so far, failed ones included.
    pub fn calls(&self, addressed: Addressed, op: i32) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .get(&(addressed, op))
            .copied()
            .unwrap_or(0)
    }

    /// Number of processor invocations of `op`.
    pub fn processor_calls(&self, op: ProcessorOp) -> usize {
        self.calls(Addressed::Processor, op.code())
    }

    /// Cache names decoded from request payloads, in order.
    pub fn names(&self) -> Vec<String> {
        self.state.lock().unwrap().names.clone()
    }

    /// Handles released so far.
    pub fn released(&self) -> Vec<u64> {
        self.state.lock().unwrap().released.clone()
    }

    /// Handles handed out and not yet released.
    pub fn live(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.handed_out.len() - state.released.len()
    }

    fn answer(&self, target: Target, op: i32, payload: &[u8]) -> Result<Response> {
        let addressed = match target {
            Target::Processor => Addressed::Processor,
            Target::Object(_) => Addressed::Object,
        };
        let key = (addressed, op);

        let mut state = self.state.lock().unwrap();
        *state.calls.entry(key).or_insert(0) += 1;

        if let Some(left) = state.failures.get_mut(&key) {
            if *left > 0 {
                *left -= 1;
                return Err(GridwireError::Remote {
                    code: INJECTED,
                    message: format!("injected failure of op {}", op),
                });
            }
        }
        if state.null_next.remove(&key) {
            return Ok(Response::Object(None));
        }

        match target {
            Target::Processor => {
                let op = ProcessorOp::try_from(op)?;
                match op {
                    ProcessorOp::GetTransactions | ProcessorOp::GetClusterGroup => {
                        let raw = state.handle();
                        state.singletons.insert(op.code(), raw);
                        Ok(state.hand_out(raw))
                    }
                    _ => {
                        let mut input = InteropInputStream::new(payload);
                        let name = BinaryReader::new(&mut input).read_string()?;
                        state.names.push(name.clone());
                        Self::cache_op(&mut state, op, name)
                    }
                }
            }
            Target::Object(group) => match ClusterGroupOp::try_from(op)? {
                ClusterGroupOp::GetCompute => {
                    let raw = state.handle();
                    state.compute.insert(group.get(), raw);
                    Ok(state.hand_out(raw))
                }
            },
        }
    }

    fn cache_op(state: &mut State, op: ProcessorOp, name: String) -> Result<Response> {
        let existing = state.caches.get(&name).copied();
        match (op, existing) {
            (ProcessorOp::GetCache, Some(raw)) => Ok(state.hand_out(raw)),
            (ProcessorOp::GetCache, None) => Ok(Response::Object(None)),
            (ProcessorOp::CreateCache, Some(_)) => Err(GridwireError::Remote {
                code: CACHE_EXISTS,
                message: format!("Cache already exists: {}", name),
            }),
            (ProcessorOp::CreateCache | ProcessorOp::GetOrCreateCache, None) => {
                let raw = state.handle();
                state.caches.insert(name, raw);
                Ok(state.hand_out(raw))
            }
            (ProcessorOp::GetOrCreateCache, Some(raw)) => Ok(state.hand_out(raw)),
            (ProcessorOp::DestroyCache, _) => {
                state.caches.remove(&name);
                Ok(Response::Long(0))
            }
            (other, _) => Err(GridwireError::Protocol(format!(
                "{:?} carries no cache name",
                other
            ))),
        }
    }
}

impl Boundary for FakeProcessor {
    fn invoke<'a>(&'a self, invocation: Invocation<'a>) -> BoxFuture<'a, Result<Response>> {
        Box::pin(async move {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.answer(invocation.target, invocation.op, invocation.payload)
        })
    }

    fn release(&self, handle: RemoteHandle) {
        self.state.lock().unwrap().released.push(handle.get());
    }
}
