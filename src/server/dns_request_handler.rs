//! DNS Request Handler implementation.
//!
//! Turns wire requests into chain requests, runs them through the resolver
//! chain and sends the chain's answer back to the client.

use crate::config::Config;
use crate::resolver::{Request as ChainRequest, Resolver};
use hickory_server::authority::MessageResponseBuilder;
use hickory_server::proto::op::{Header, Message, MessageType, Query, ResponseCode};
use hickory_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;

/// Handles incoming DNS queries by delegating to the resolver chain.
#[derive(Clone)]
pub struct DnsHandler {
    /// Head of the resolver chain.
    chain: Arc<dyn Resolver>,
    /// Client IP -> configured client names.
    client_names: Arc<HashMap<String, Vec<String>>>,
}

impl DnsHandler {
    pub fn new(config: &Config, chain: Arc<dyn Resolver>) -> Self {
        Self {
            chain,
            client_names: Arc::new(config.client_names.clone()),
        }
    }

    /// Extracts the chain request from the incoming wire request.
    fn chain_request(&self, request: &Request) -> ChainRequest {
        let client_ip = request.src().ip();
        let client_names = self
            .client_names
            .get(&client_ip.to_string())
            .cloned()
            .unwrap_or_default();

        let mut message = Message::new();
        message
            .set_id(request.header().id())
            .set_message_type(MessageType::Query)
            .set_op_code(request.header().op_code())
            .set_recursion_desired(request.header().recursion_desired());
        for query in request.queries() {
            message.add_query(Query::query(query.name().into(), query.query_type()));
        }

        ChainRequest {
            client_ip,
            client_names,
            protocol: request.protocol(),
            message,
        }
    }

    async fn send<R: ResponseHandler>(
        request: &Request,
        mut response_handle: R,
        header: Header,
        answers: &[hickory_server::proto::rr::Record],
    ) -> ResponseInfo {
        let builder = MessageResponseBuilder::from_message_request(request);
        let response = builder.build(header, answers.iter(), &[], &[], &[]);
        match response_handle.send_response(response).await {
            Ok(info) => info,
            Err(e) => {
                error!("Failed to send response to {}: {}", request.src(), e);
                ResponseInfo::from(header)
            }
        }
    }
}

#[async_trait::async_trait]
impl RequestHandler for DnsHandler {
    async fn handle_request<R: ResponseHandler>(
        &self,
        request: &Request,
        response_handle: R,
    ) -> ResponseInfo {
        let mut header = Header::response_from_request(request.header());
        header.set_authoritative(false);
        header.set_recursion_available(true);

        let chain_request = self.chain_request(request);
        match self.chain.resolve(&chain_request).await {
            Ok(response) => {
                header.set_response_code(response.message.response_code());
                Self::send(request, response_handle, header, response.message.answers()).await
            }
            Err(e) => {
                error!("Resolution failed for {}: {}", request.src(), e);
                header.set_response_code(ResponseCode::ServFail);
                Self::send(request, response_handle, header, &[]).await
            }
        }
    }
}
