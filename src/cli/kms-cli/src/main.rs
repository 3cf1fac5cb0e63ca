//! KMS CLI - Command line interface.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::{Parser, Subcommand, ValueEnum};
use reqwest::header::{HeaderMap, HeaderName, ACCEPT, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::Method;
use tracing::debug;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use kms_protocol::client::DEFAULT_ENCLAVE;
use kms_protocol::{
    AddKeyVersionRequest, Client, ClientConfig, CreateKeyRequest, DecryptRequest,
    DescribeKeyRequest, EditClusterRequest, EncryptRequest, Encoding, GenerateKeyRequest,
    KeyType, ListRequest, ListResponse, MacRequest, NodeId, RemoveKeyVersionRequest, Request,
    Response, Transport, TransportError, VersionRef, WireMapping,
};

// ============================================================================
// CLI Structure
// ============================================================================

#[derive(Parser)]
#[command(name = "kms")]
#[command(about = "KMS CLI - Manage enclaves and keys, encrypt and decrypt data")]
#[command(version)]
struct Cli {
    /// KMS server address
    #[arg(long, default_value = "http://127.0.0.1:7373", env = "KMS_SERVER")]
    server: String,

    /// Enclave to operate in
    #[arg(long, default_value = DEFAULT_ENCLAVE, env = "KMS_ENCLAVE")]
    enclave: String,

    /// Request encoding
    #[arg(long, value_enum, default_value_t = WireEncoding::Binary)]
    encoding: WireEncoding,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum WireEncoding {
    Binary,
    Json,
}

impl From<WireEncoding> for Encoding {
    fn from(encoding: WireEncoding) -> Self {
        match encoding {
            WireEncoding::Binary => Encoding::Binary,
            WireEncoding::Json => Encoding::Json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show cluster status
    Status,
    /// Cluster membership
    Cluster {
        #[command(subcommand)]
        command: ClusterCommands,
    },
    /// Enclave management
    Enclave {
        #[command(subcommand)]
        command: EnclaveCommands,
    },
    /// Key management
    Key {
        #[command(subcommand)]
        command: KeyCommands,
    },
    /// Encrypt a plaintext
    Encrypt {
        /// Key name
        name: String,
        /// Plaintext
        plaintext: String,
        /// Key version (latest if omitted)
        #[arg(long)]
        version: Option<u32>,
        /// Associated data
        #[arg(long)]
        context: Option<String>,
    },
    /// Decrypt a base64 ciphertext
    Decrypt {
        /// Key name
        name: String,
        /// Ciphertext, base64
        ciphertext: String,
        /// Key version that produced the ciphertext
        #[arg(long)]
        version: u32,
        /// Associated data given at encryption
        #[arg(long)]
        context: Option<String>,
    },
    /// Generate a data encryption key
    Generate {
        /// Key name
        name: String,
        /// Data key length in bytes
        #[arg(long)]
        length: Option<u32>,
        /// Key version (latest if omitted)
        #[arg(long)]
        version: Option<u32>,
        /// Associated data
        #[arg(long)]
        context: Option<String>,
    },
    /// Compute a MAC
    Mac {
        /// Key name
        name: String,
        /// Message
        message: String,
        /// Key version (latest if omitted)
        #[arg(long)]
        version: Option<u32>,
    },
}

#[derive(Subcommand)]
enum ClusterCommands {
    /// Remove nodes from the cluster
    Remove {
        /// Node IDs
        #[arg(required = true)]
        ids: Vec<NodeId>,
    },
}

#[derive(Subcommand)]
enum EnclaveCommands {
    /// Create an enclave
    Create {
        /// Enclave name
        name: String,
    },
    /// Delete an enclave and its keys
    Delete {
        /// Enclave name
        name: String,
    },
    /// List enclaves
    List {
        /// Name prefix
        #[arg(long, default_value = "")]
        prefix: String,
    },
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Create a key
    Create {
        /// Key name
        name: String,
        /// Key type (AES256, ChaCha20)
        #[arg(long = "type")]
        key_type: Option<KeyType>,
    },
    /// Add a version to a key
    AddVersion {
        /// Key name
        name: String,
        /// Key type (AES256, ChaCha20)
        #[arg(long = "type")]
        key_type: Option<KeyType>,
    },
    /// Remove a key version
    RemoveVersion {
        /// Key name
        name: String,
        /// Version to remove (latest if omitted)
        #[arg(long)]
        version: Option<u32>,
    },
    /// Delete a key and all its versions
    Delete {
        /// Key name
        name: String,
    },
    /// Describe a key version
    Describe {
        /// Key name
        name: String,
        /// Key version (latest if omitted)
        #[arg(long)]
        version: Option<u32>,
    },
    /// List keys
    List {
        /// Name prefix
        #[arg(long, default_value = "")]
        prefix: String,
    },
}

// ============================================================================
// HTTP Transport
// ============================================================================

/// Sends protocol requests over HTTP.
struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, request: &Request) -> String {
        format!("{}{}", self.base_url, request.path())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        let method = Method::from_bytes(request.api.method().as_bytes())
            .map_err(|e| TransportError(e.to_string()))?;

        let url = self.url(&request);
        debug!(method = %method, url = %url, "HTTP request");

        let mut builder = self
            .client
            .request(method, url)
            .header(CONTENT_TYPE, &request.content_type)
            .header(ACCEPT, &request.accept);
        if request.api.enclave_scoped() {
            builder = builder.query(&[("enclave", request.enclave.as_str())]);
        }

        let resp = builder
            .body(request.body)
            .send()
            .await
            .map_err(|e| TransportError(format!("Failed to connect to server: {e}")))?;

        let status = resp.status().as_u16();
        debug!(status, "HTTP response");
        let headers = resp.headers().clone();
        let body = resp
            .bytes()
            .await
            .map_err(|e| TransportError(format!("Failed to read response: {e}")))?
            .to_vec();

        Ok(to_response(status, &headers, body))
    }
}

/// Builds a protocol response from HTTP parts. A missing or unparsable
/// `Content-Length` is passed on as `-1`.
fn to_response(status: u16, headers: &HeaderMap, body: Vec<u8>) -> Response {
    let header = |name: HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    Response {
        status,
        content_type: header(CONTENT_TYPE).unwrap_or_default(),
        content_length: header(CONTENT_LENGTH)
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(-1),
        body,
    }
}

// ============================================================================
// Output
// ============================================================================

fn json_output(format: &str) -> Result<bool> {
    match format {
        "text" => Ok(false),
        "json" => Ok(true),
        _ => bail!("Unknown format: {}. Use 'text' or 'json'", format),
    }
}

fn print_json<T: WireMapping>(value: &T) -> Result<()> {
    let wire = value.to_wire().context("Failed to encode response")?;
    println!("{}", serde_json::to_string_pretty(&wire)?);
    Ok(())
}

fn print_list(list: &ListResponse, empty: &str, title: &str) {
    if list.items.is_empty() {
        println!("{}", empty);
    } else {
        println!("{}:", title);
        for item in &list.items {
            println!("  {}", item);
        }
    }
}

fn version_ref(version: Option<u32>) -> VersionRef {
    VersionRef::from_wire(version.unwrap_or(0))
}

fn context_bytes(context: Option<String>) -> Vec<u8> {
    context.map(String::into_bytes).unwrap_or_default()
}

// ============================================================================
// Command Handlers
// ============================================================================

type KmsClient = Client<HttpTransport>;

async fn cmd_status(client: &KmsClient, json: bool) -> Result<()> {
    let status = client.status().await.context("Status failed")?;
    if json {
        return print_json(&status);
    }

    println!("Cluster status:");
    match status.leader() {
        Some(id) => println!("  Leader:  {}", id),
        None => println!("  Leader:  none"),
    }
    println!("  Quorum:  {}", status.quorum_reachable());

    let mut up: Vec<_> = status.nodes_up.values().collect();
    up.sort_by_key(|node| node.id);
    for node in up {
        println!();
        println!("  Node {} ({}) up", node.id, node.endpoint);
        println!("    Role:      {}", node.role);
        println!("    Version:   {} (API {})", node.version, node.api_version);
        println!("    Commit:    {}", node.commit);
        println!("    Uptime:    {}s", node.uptime.num_seconds());
        println!(
            "    Heartbeat: {}ms ago, every {}ms",
            node.last_heartbeat.num_milliseconds(),
            node.heartbeat_interval.num_milliseconds()
        );
        println!("    Platform:  {}/{} ({} CPUs)", node.os, node.arch, node.usable_cpus);
    }

    let mut down: Vec<_> = status.nodes_down.iter().collect();
    down.sort();
    for (id, addr) in down {
        println!();
        println!("  Node {} ({}) down", id, addr);
    }

    Ok(())
}

async fn cmd_cluster_remove(client: &KmsClient, ids: Vec<NodeId>) -> Result<()> {
    client
        .edit_cluster(&EditClusterRequest {
            remove_ids: ids.clone(),
        })
        .await
        .context("Edit cluster failed")?;
    println!("Removed nodes {:?}", ids);
    Ok(())
}

async fn cmd_enclave_list(client: &KmsClient, prefix: String, json: bool) -> Result<()> {
    let mut request = ListRequest::with_prefix(prefix);
    let mut all = ListResponse::default();
    loop {
        let page = client
            .list_enclaves(&request)
            .await
            .context("List enclaves failed")?;
        all.items.extend(page.items.iter().cloned());
        match request.next_page(&page) {
            Some(next) => request = next,
            None => break,
        }
    }

    if json {
        return print_json(&all);
    }
    print_list(&all, "No enclaves found", "Enclaves");
    Ok(())
}

async fn cmd_key_describe(
    client: &KmsClient,
    name: &str,
    version: Option<u32>,
    json: bool,
) -> Result<()> {
    let status = client
        .describe_key(
            name,
            &DescribeKeyRequest {
                version: version_ref(version),
            },
        )
        .await
        .context("Describe key failed")?;
    if json {
        return print_json(&status);
    }

    println!("Key '{}':", status.name);
    println!("  Version:    {}", status.version);
    println!("  Type:       {}", status.key_type);
    println!("  Created at: {}", status.created_at.to_rfc3339());
    println!("  Created by: {}", status.created_by);
    Ok(())
}

async fn cmd_key_list(client: &KmsClient, prefix: String, json: bool) -> Result<()> {
    let mut request = ListRequest::with_prefix(prefix);
    let mut all = ListResponse::default();
    loop {
        let page = client.list_keys(&request).await.context("List keys failed")?;
        all.items.extend(page.items.iter().cloned());
        match request.next_page(&page) {
            Some(next) => request = next,
            None => break,
        }
    }

    if json {
        return print_json(&all);
    }
    print_list(&all, "No keys found", "Keys");
    Ok(())
}

async fn cmd_encrypt(
    client: &KmsClient,
    name: &str,
    plaintext: String,
    version: Option<u32>,
    context: Option<String>,
    json: bool,
) -> Result<()> {
    let envelope = client
        .encrypt(
            name,
            &EncryptRequest {
                version: version_ref(version),
                plaintext: plaintext.into_bytes(),
                associated_data: context_bytes(context).into(),
            },
        )
        .await
        .context("Encrypt failed")?;
    if json {
        return print_json(&envelope);
    }

    println!("Version:    {}", envelope.version);
    println!("Ciphertext: {}", STANDARD.encode(&envelope.ciphertext));
    Ok(())
}

async fn cmd_decrypt(
    client: &KmsClient,
    name: &str,
    ciphertext: &str,
    version: u32,
    context: Option<String>,
    json: bool,
) -> Result<()> {
    let ciphertext = STANDARD
        .decode(ciphertext.trim())
        .context("Ciphertext is not valid base64")?;
    let Some(version) = std::num::NonZeroU32::new(version) else {
        bail!("Decrypt needs the exact key version, not 0");
    };

    let response = client
        .decrypt(
            name,
            &DecryptRequest {
                version,
                ciphertext,
                associated_data: context_bytes(context).into(),
            },
        )
        .await
        .context("Decrypt failed")?;
    if json {
        return print_json(&response);
    }

    match std::str::from_utf8(&response.plaintext) {
        Ok(text) => println!("{}", text),
        Err(_) => println!("{}", STANDARD.encode(&response.plaintext)),
    }
    Ok(())
}

async fn cmd_generate(
    client: &KmsClient,
    name: &str,
    length: Option<u32>,
    version: Option<u32>,
    context: Option<String>,
    json: bool,
) -> Result<()> {
    let key = client
        .generate_key(
            name,
            &GenerateKeyRequest {
                version: version_ref(version),
                associated_data: context_bytes(context).into(),
                length,
            },
        )
        .await
        .context("Generate key failed")?;
    if json {
        return print_json(&key);
    }

    println!("Version:    {}", key.version);
    println!("Plaintext:  {}", STANDARD.encode(&key.plaintext));
    println!("Ciphertext: {}", STANDARD.encode(&key.ciphertext));
    Ok(())
}

async fn cmd_mac(
    client: &KmsClient,
    name: &str,
    message: String,
    version: Option<u32>,
    json: bool,
) -> Result<()> {
    let response = client
        .mac(
            name,
            &MacRequest {
                version: version_ref(version),
                message: message.into_bytes(),
            },
        )
        .await
        .context("MAC failed")?;
    if json {
        return print_json(&response);
    }

    println!("Version: {}", response.version);
    println!("MAC:     {}", STANDARD.encode(&response.mac));
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let json = json_output(&cli.format)?;
    let client = Client::new(
        HttpTransport::new(&cli.server)?,
        ClientConfig {
            enclave: cli.enclave,
            encoding: cli.encoding.into(),
        },
    );

    match cli.command {
        Commands::Status => cmd_status(&client, json).await,
        Commands::Cluster { command } => match command {
            ClusterCommands::Remove { ids } => cmd_cluster_remove(&client, ids).await,
        },
        Commands::Enclave { command } => match command {
            EnclaveCommands::Create { name } => {
                client
                    .create_enclave(&name)
                    .await
                    .context("Create enclave failed")?;
                println!("Enclave '{}' created", name);
                Ok(())
            },
            EnclaveCommands::Delete { name } => {
                client
                    .delete_enclave(&name)
                    .await
                    .context("Delete enclave failed")?;
                println!("Enclave '{}' deleted", name);
                Ok(())
            },
            EnclaveCommands::List { prefix } => cmd_enclave_list(&client, prefix, json).await,
        },
        Commands::Key { command } => match command {
            KeyCommands::Create { name, key_type } => {
                client
                    .create_key(&name, &CreateKeyRequest { key_type })
                    .await
                    .context("Create key failed")?;
                println!("Key '{}' created", name);
                Ok(())
            },
            KeyCommands::AddVersion { name, key_type } => {
                client
                    .add_key_version(&name, &AddKeyVersionRequest { key_type })
                    .await
                    .context("Add key version failed")?;
                println!("Version added to key '{}'", name);
                Ok(())
            },
            KeyCommands::RemoveVersion { name, version } => {
                let version = version_ref(version);
                client
                    .remove_key_version(&name, &RemoveKeyVersionRequest { version })
                    .await
                    .context("Remove key version failed")?;
                println!("Version {} removed from key '{}'", version, name);
                Ok(())
            },
            KeyCommands::Delete { name } => {
                client.delete_key(&name).await.context("Delete key failed")?;
                println!("Key '{}' deleted", name);
                Ok(())
            },
            KeyCommands::Describe { name, version } => {
                cmd_key_describe(&client, &name, version, json).await
            },
            KeyCommands::List { prefix } => cmd_key_list(&client, prefix, json).await,
        },
        Commands::Encrypt {
            name,
            plaintext,
            version,
            context,
        } => cmd_encrypt(&client, &name, plaintext, version, context, json).await,
        Commands::Decrypt {
            name,
            ciphertext,
            version,
            context,
        } => cmd_decrypt(&client, &name, &ciphertext, version, context, json).await,
        Commands::Generate {
            name,
            length,
            version,
            context,
        } => cmd_generate(&client, &name, length, version, context, json).await,
        Commands::Mac {
            name,
            message,
            version,
        } => cmd_mac(&client, &name, message, version, json).await,
    }
}

#[cfg(test)]
mod tests {
    use kms_protocol::Api;

    use super::*;

    fn request(api: Api, name: &str) -> Request {
        Request {
            api,
            enclave: DEFAULT_ENCLAVE.to_string(),
            name: name.to_string(),
            content_type: Encoding::Binary.content_type().to_string(),
            accept: Encoding::Binary.content_type().to_string(),
            body: Vec::new(),
        }
    }

    #[test]
    fn test_url_joins_base_and_route() {
        let transport = HttpTransport::new("http://127.0.0.1:7373/").unwrap();

        assert_eq!(
            transport.url(&request(Api::Encrypt, "orders")),
            "http://127.0.0.1:7373/v1/key/encrypt/orders"
        );
        assert_eq!(
            transport.url(&request(Api::Status, "")),
            "http://127.0.0.1:7373/v1/status"
        );
    }

    #[test]
    fn test_output_format() {
        assert!(!json_output("text").unwrap());
        assert!(json_output("json").unwrap());
        assert!(json_output("yaml").is_err());
    }

    #[test]
    fn test_cli_parses_key_create() {
        let cli = Cli::try_parse_from(["kms", "key", "create", "orders", "--type", "ChaCha20"])
            .unwrap();

        match cli.command {
            Commands::Key {
                command: KeyCommands::Create { name, key_type },
            } => {
                assert_eq!(name, "orders");
                assert_eq!(key_type, Some(KeyType::ChaCha20));
            },
            _ => panic!("unexpected command"),
        }
        assert_eq!(cli.enclave, DEFAULT_ENCLAVE);
    }

    #[test]
    fn test_response_keeps_declared_length() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, "application/json".parse().unwrap());
        headers.insert(CONTENT_LENGTH, "2".parse().unwrap());

        let response = to_response(200, &headers, b"{}".to_vec());
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type, "application/json");
        assert_eq!(response.content_length, 2);
    }

    #[test]
    fn test_response_without_length_is_negative() {
        let response = to_response(200, &HeaderMap::new(), b"{}".to_vec());
        assert_eq!(response.content_length, -1);
        assert_eq!(response.content_type, "");

        // The protocol layer rejects it instead of trusting the body.
        let err = kms_protocol::codec::read_body(response.content_length, response.body)
            .unwrap_err();
        assert!(matches!(err, kms_protocol::KmsError::LengthRequired));
    }

    #[test]
    fn test_response_unparsable_length_is_negative() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, "lots".parse().unwrap());

        assert_eq!(to_response(200, &headers, Vec::new()).content_length, -1);
    }

    #[test]
    fn test_remove_version_defaults_to_latest() {
        for (args, expected) in [
            (vec!["kms", "key", "remove-version", "k"], VersionRef::Latest),
            (vec!["kms", "key", "remove-version", "k", "--version", "0"], VersionRef::Latest),
            (vec!["kms", "key", "remove-version", "k", "--version", "3"], VersionRef::exact(3)),
        ] {
            let cli = Cli::try_parse_from(args).unwrap();
            match cli.command {
                Commands::Key {
                    command: KeyCommands::RemoveVersion { version, .. },
                } => assert_eq!(version_ref(version), expected),
                _ => panic!("unexpected command"),
            }
        }
    }
}
