//! Concurrent fan-out for batch payloads.

use std::thread;

use super::request::RpcRequest;
use super::response::RpcResponse;

/// Runs every request on its own scoped thread and returns the responses in
/// request order.
///
/// At most `fanout` sub-requests run at once; the batch proceeds in waves of
/// that size. Each thread writes into the slot matching its request index, so
/// completion order has no effect on output order.
pub(crate) fn fan_out<F>(requests: &[RpcRequest], fanout: usize, respond: F) -> Vec<RpcResponse>
where
    F: Fn(&RpcRequest) -> RpcResponse + Sync,
{
    let fanout = fanout.max(1);
    let respond = &respond;
    let mut slots: Vec<Option<RpcResponse>> = vec![None; requests.len()];
    for (wave_slots, wave) in slots.chunks_mut(fanout).zip(requests.chunks(fanout)) {
        thread::scope(|scope| {
            for (slot, request) in wave_slots.iter_mut().zip(wave) {
                scope.spawn(move || *slot = Some(respond(request)));
            }
        });
    }
    slots.into_iter().flatten().collect()
}
