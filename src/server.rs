//! DNS front-end: UDP transport and per-question dispatch.
//!
//! Each inbound message is handled on its own task against whatever zone
//! snapshots the table holds at that moment; the query path never touches
//! the network or disk.

use std::net::SocketAddr;
use std::sync::Arc;

use hickory_proto::op::{Message, MessageType, OpCode, ResponseCode};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::DnsConfig;
use crate::error::DnsError;
use crate::metrics::{self, QueryOutcome, Timer};
use crate::zone::ZoneTable;

/// Largest inbound datagram we accept.
const MAX_MESSAGE_SIZE: usize = 4096;

/// Authoritative DNS server over UDP.
pub struct DnsServer {
    socket: Arc<UdpSocket>,
    table: ZoneTable,
}

impl DnsServer {
    /// Bind the listen socket. The server does not serve until [`run`] is
    /// called.
    ///
    /// [`run`]: DnsServer::run
    pub async fn bind(config: &DnsConfig, table: ZoneTable) -> Result<Self, DnsError> {
        let socket = UdpSocket::bind(config.listen_addr).await?;
        info!(addr = %socket.local_addr()?, "DNS UDP listening");

        Ok(Self {
            socket: Arc::new(socket),
            table,
        })
    }

    /// The address the server actually bound (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, DnsError> {
        Ok(self.socket.local_addr()?)
    }

    /// Serve queries until the cancellation token fires.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), DnsError> {
        let mut buf = vec![0u8; MAX_MESSAGE_SIZE];

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("DNS server shutting down");
                    return Ok(());
                }

                recv = self.socket.recv_from(&mut buf) => {
                    let (len, peer) = match recv {
                        Ok(pair) => pair,
                        Err(e) => {
                            warn!(error = %e, "failed to receive DNS message");
                            continue;
                        }
                    };

                    let packet = buf[..len].to_vec();
                    let table = self.table.clone();
                    let socket = self.socket.clone();
                    tokio::spawn(async move {
                        if let Some(reply) = handle_message(&table, &packet) {
                            if let Err(e) = socket.send_to(&reply, peer).await {
                                debug!(peer = %peer, error = %e, "failed to send DNS response");
                            }
                        }
                    });
                }
            }
        }
    }
}

/// Answer one inbound message, or `None` when it should be dropped.
///
/// Undecodable packets and stray responses are dropped silently. Every
/// reply is authoritative, echoes the request id and question section, and
/// concatenates per-question answers in question order. NXDOMAIN is
/// returned only when no question fell inside a served zone.
fn handle_message(table: &ZoneTable, packet: &[u8]) -> Option<Vec<u8>> {
    let request = match Message::from_vec(packet) {
        Ok(message) => message,
        Err(e) => {
            trace!(error = %e, "dropping undecodable message");
            metrics::record_dropped_message();
            return None;
        }
    };

    if request.message_type() != MessageType::Query {
        trace!(id = request.id(), "dropping non-query message");
        metrics::record_dropped_message();
        return None;
    }

    let mut response = Message::new();
    response.set_id(request.id());
    response.set_message_type(MessageType::Response);
    response.set_op_code(request.op_code());
    response.set_authoritative(true);
    response.set_recursion_desired(request.recursion_desired());
    response.set_recursion_available(false);
    response.add_queries(request.queries().to_vec());

    if request.op_code() != OpCode::Query {
        debug!(op_code = ?request.op_code(), "unimplemented op code");
        response.set_response_code(ResponseCode::NotImp);
        return response.to_vec().ok();
    }

    let mut any_zone = false;
    for query in request.queries() {
        let timer = Timer::start();
        let qtype = query.query_type();
        let qtype_str = format!("{qtype:?}");
        let qname = query.name();

        let Some(zone) = table.find(&qname.to_ascii()) else {
            debug!(qname = %qname, rtype = ?qtype, "no zone for query");
            metrics::record_query(&qtype_str, QueryOutcome::NxDomain, timer.elapsed());
            continue;
        };
        any_zone = true;

        let answers = zone.lookup(qname, qtype);
        debug!(
            qname = %qname,
            rtype = ?qtype,
            zone = %zone.name,
            answers = answers.len(),
            "answered query"
        );
        let outcome = if answers.is_empty() {
            QueryOutcome::NoRecords
        } else {
            metrics::record_answers_returned(answers.len());
            QueryOutcome::Answered
        };
        metrics::record_query(&qtype_str, outcome, timer.elapsed());

        for answer in answers {
            response.add_answer(answer);
        }
    }

    let rcode = if !any_zone && !request.queries().is_empty() {
        ResponseCode::NXDomain
    } else {
        ResponseCode::NoError
    };
    response.set_response_code(rcode);

    match response.to_vec() {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!(error = %e, "failed to encode DNS response");
            None
        }
    }
}
