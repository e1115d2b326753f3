use super::types::{Request, Resolver, Response, ResponseType, Upstream};
use anyhow::{Context, Result};
use hickory_server::proto::op::{Message, MessageType, ResponseCode};
use hickory_server::proto::rr::Record;
use tracing::error;

/// Chain tail forwarding queries to the configured upstreams, in order.
pub struct UpstreamResolver {
    pub(crate) upstreams: Vec<Upstream>,
}

impl UpstreamResolver {
    pub fn new(upstreams: Vec<Upstream>) -> Self {
        Self { upstreams }
    }
}

fn answer(request: &Request, code: ResponseCode, records: Vec<Record>) -> Message {
    let mut message = Message::new();
    message
        .set_id(request.message.id())
        .set_message_type(MessageType::Response)
        .set_op_code(request.message.op_code())
        .set_recursion_desired(request.message.recursion_desired())
        .set_recursion_available(true)
        .set_response_code(code);
    message.add_queries(request.message.queries().to_vec());
    message.add_answers(records);
    message
}

#[async_trait::async_trait]
impl Resolver for UpstreamResolver {
    async fn resolve(&self, request: &Request) -> Result<Response> {
        let query = request
            .message
            .queries()
            .first()
            .context("Request carries no question")?;
        let name = query.name().clone();
        let qtype = query.query_type();

        for upstream in &self.upstreams {
            match upstream.resolver.lookup(name.clone(), qtype).await {
                Ok(lookup) => {
                    return Ok(Response {
                        message: answer(request, ResponseCode::NoError, lookup.records().to_vec()),
                        reason: format!("RESOLVED ({})", upstream.url),
                        response_type: ResponseType::Resolved,
                    });
                }
                Err(e) if e.is_nx_domain() => {
                    return Ok(Response {
                        message: answer(request, ResponseCode::NXDomain, Vec::new()),
                        reason: format!("RESOLVED ({})", upstream.url),
                        response_type: ResponseType::Resolved,
                    });
                }
                Err(e) if e.is_no_records_found() => {
                    return Ok(Response {
                        message: answer(request, ResponseCode::NoError, Vec::new()),
                        reason: format!("RESOLVED ({})", upstream.url),
                        response_type: ResponseType::Resolved,
                    });
                }
                Err(e) => {
                    error!("Upstream {} failed for {}: {}", upstream.url, name, e);
                    continue;
                }
            }
        }
        Err(anyhow::anyhow!("All upstreams failed for {}", name))
    }

    fn configuration(&self) -> Vec<String> {
        self.upstreams
            .iter()
            .enumerate()
            .map(|(idx, u)| format!("upstream[{}]: {}", idx, u.url))
            .collect()
    }
}
