//! Request dispatch.
//!
//! Decodes a request body in the encoding named by its content type, runs
//! the operation and encodes the result in the encoding the caller
//! accepts. Failures are encoded as an `ErrorResponse` with the error's
//! status code, in the accepted encoding as well.

use tracing::{debug, error};

use kms_protocol::codec::{self, Encoding};
use kms_protocol::{
    AddKeyVersionRequest, Api, CreateKeyRequest, DecryptRequest, DescribeKeyRequest,
    EditClusterRequest, EncryptRequest, ErrorKind, GenerateKeyRequest, KmsError, ListRequest,
    MacRequest, RemoveKeyVersionRequest, Request, Response, WireMapping,
};

use crate::node::Node;

/// Handles one request on behalf of `identity`.
pub async fn handle(node: &Node, identity: &str, request: Request) -> Response {
    let accept = Encoding::from_content_type(&request.accept);

    match dispatch(node, identity, &request).await {
        Ok(body) => {
            debug!(
                api = ?request.api,
                enclave = %request.enclave,
                name = %request.name,
                "Request served"
            );
            respond(200, accept, body)
        },
        Err(err) => {
            if err.kind() == ErrorKind::Internal {
                error!(api = ?request.api, error = %err, "Request failed");
            } else {
                debug!(api = ?request.api, error = %err, "Request rejected");
            }
            let status = err.status_code();
            match codec::encode_error(&err, accept) {
                Ok(body) => respond(status, accept, body),
                Err(_) => respond(status, accept, Vec::new()),
            }
        },
    }
}

fn respond(status: u16, encoding: Encoding, body: Vec<u8>) -> Response {
    Response {
        status,
        content_type: encoding.content_type().to_string(),
        content_length: i64::try_from(body.len()).unwrap_or(-1),
        body,
    }
}

/// Decodes a request message. An empty body is the message with every
/// field unset.
fn parse<T: WireMapping>(request: &Request) -> Result<T, KmsError> {
    if request.body.is_empty() {
        return Ok(T::from_wire(T::Wire::default())?);
    }
    let encoding = Encoding::from_content_type(&request.content_type);
    Ok(codec::decode(&request.body, encoding)?)
}

/// Encodes a response message. Failing to encode is the server's fault,
/// never the caller's.
fn reply<T: WireMapping>(request: &Request, value: &T) -> Result<Vec<u8>, KmsError> {
    codec::encode(value, Encoding::from_content_type(&request.accept))
        .map_err(|e| KmsError::Internal(format!("failed to encode response: {e}")))
}

async fn dispatch(node: &Node, identity: &str, request: &Request) -> Result<Vec<u8>, KmsError> {
    let engine = node.engine();
    let enclave = request.enclave.as_str();
    let name = request.name.as_str();

    match request.api {
        Api::Status => reply(request, &node.cluster_status().await),
        Api::EditCluster => {
            node.edit_cluster(&parse::<EditClusterRequest>(request)?).await;
            Ok(Vec::new())
        },

        Api::CreateEnclave => {
            engine.create_enclave(name).await?;
            node.commit();
            Ok(Vec::new())
        },
        Api::DeleteEnclave => {
            engine.delete_enclave(name).await?;
            node.commit();
            Ok(Vec::new())
        },
        Api::ListEnclaves => {
            let list = engine.list_enclaves(&parse::<ListRequest>(request)?).await;
            reply(request, &list)
        },

        Api::CreateKey => {
            let create = parse::<CreateKeyRequest>(request)?;
            engine.create_key(enclave, name, &create, identity).await?;
            node.commit();
            Ok(Vec::new())
        },
        Api::AddKeyVersion => {
            let add = parse::<AddKeyVersionRequest>(request)?;
            engine.add_key_version(enclave, name, &add, identity).await?;
            node.commit();
            Ok(Vec::new())
        },
        Api::RemoveKeyVersion => {
            let remove = parse::<RemoveKeyVersionRequest>(request)?;
            engine.remove_key_version(enclave, name, &remove).await?;
            node.commit();
            Ok(Vec::new())
        },
        Api::DeleteKey => {
            engine.delete_key(enclave, name).await?;
            node.commit();
            Ok(Vec::new())
        },
        Api::DescribeKey => {
            let describe = parse::<DescribeKeyRequest>(request)?;
            reply(request, &engine.describe_key(enclave, name, &describe).await?)
        },
        Api::ListKeys => {
            let list = parse::<ListRequest>(request)?;
            reply(request, &engine.list_keys(enclave, &list).await?)
        },

        Api::Encrypt => {
            let encrypt = parse::<EncryptRequest>(request)?;
            reply(request, &engine.encrypt(enclave, name, &encrypt).await?)
        },
        Api::Decrypt => {
            let decrypt = parse::<DecryptRequest>(request)?;
            reply(request, &engine.decrypt(enclave, name, &decrypt).await?)
        },
        Api::GenerateKey => {
            let generate = parse::<GenerateKeyRequest>(request)?;
            reply(request, &engine.generate_key(enclave, name, &generate).await?)
        },
        Api::Mac => {
            let mac = parse::<MacRequest>(request)?;
            reply(request, &engine.mac(enclave, name, &mac).await?)
        },
    }
}
