//! KMS client.
//!
//! The client turns typed requests into encoded [`Request`]s, hands them to
//! a [`Transport`] and decodes the response with the encoding the server
//! declares. Inputs the server would reject are rejected here first,
//! before anything is sent.

use tracing::debug;

use crate::associated_data::AssociatedData;
use crate::codec::{self, Encoding};
use crate::error::KmsError;
use crate::key::{
    AddKeyVersionRequest, CreateKeyRequest, DecryptRequest, DecryptResponse, DescribeKeyRequest,
    EncryptRequest, EncryptResponse, Envelope, GenerateKeyRequest, GenerateKeyResponse,
    KeyStatus, MacRequest, MacResponse, RemoveKeyVersionRequest,
};
use crate::list::{ListRequest, ListResponse};
use crate::name::validate_name;
use crate::status::{ClusterStatus, EditClusterRequest};
use crate::transport::{Api, Request, Transport};
use crate::wire::WireMapping;

/// Enclave used when none is configured.
pub const DEFAULT_ENCLAVE: &str = "default";

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Enclave that key operations act on.
    pub enclave: String,
    /// Encoding of request bodies, also requested for responses.
    pub encoding: Encoding,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            enclave: DEFAULT_ENCLAVE.to_string(),
            encoding: Encoding::Binary,
        }
    }
}

/// KMS client over a [`Transport`].
#[derive(Debug, Clone)]
pub struct Client<T> {
    transport: T,
    config: ClientConfig,
}

impl<T: Transport> Client<T> {
    /// Creates a client.
    pub fn new(transport: T, config: ClientConfig) -> Self {
        Self { transport, config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns a client for another enclave over the same transport.
    pub fn with_enclave(&self, enclave: impl Into<String>) -> Self
    where
        T: Clone,
    {
        Self {
            transport: self.transport.clone(),
            config: ClientConfig {
                enclave: enclave.into(),
                encoding: self.config.encoding,
            },
        }
    }

    // ========================================================================
    // Cluster
    // ========================================================================

    /// Returns the cluster view of the node the transport reaches.
    pub async fn status(&self) -> Result<ClusterStatus, KmsError> {
        let (body, encoding) = self.send(Api::Status, "", Vec::new()).await?;
        Ok(codec::decode(&body, encoding)?)
    }

    /// Removes members from the node's cluster.
    pub async fn edit_cluster(&self, request: &EditClusterRequest) -> Result<(), KmsError> {
        self.call(Api::EditCluster, "", request).await?;
        Ok(())
    }

    // ========================================================================
    // Enclaves
    // ========================================================================

    /// Creates an enclave.
    pub async fn create_enclave(&self, name: &str) -> Result<(), KmsError> {
        validate_name(name)?;
        self.send(Api::CreateEnclave, name, Vec::new()).await?;
        Ok(())
    }

    /// Deletes an enclave and all its keys.
    pub async fn delete_enclave(&self, name: &str) -> Result<(), KmsError> {
        validate_name(name)?;
        self.send(Api::DeleteEnclave, name, Vec::new()).await?;
        Ok(())
    }

    /// Lists enclave names.
    pub async fn list_enclaves(&self, request: &ListRequest) -> Result<ListResponse, KmsError> {
        self.call_decode(Api::ListEnclaves, "", request).await
    }

    // ========================================================================
    // Keys
    // ========================================================================

    /// Creates a key with one version.
    pub async fn create_key(&self, name: &str, request: &CreateKeyRequest) -> Result<(), KmsError> {
        validate_name(name)?;
        self.call(Api::CreateKey, name, request).await?;
        Ok(())
    }

    /// Adds a version to a key ring.
    pub async fn add_key_version(
        &self,
        name: &str,
        request: &AddKeyVersionRequest,
    ) -> Result<(), KmsError> {
        validate_name(name)?;
        self.call(Api::AddKeyVersion, name, request).await?;
        Ok(())
    }

    /// Removes a version from a key ring.
    pub async fn remove_key_version(
        &self,
        name: &str,
        request: &RemoveKeyVersionRequest,
    ) -> Result<(), KmsError> {
        validate_name(name)?;
        self.call(Api::RemoveKeyVersion, name, request).await?;
        Ok(())
    }

    /// Deletes a key and all its versions.
    pub async fn delete_key(&self, name: &str) -> Result<(), KmsError> {
        validate_name(name)?;
        self.send(Api::DeleteKey, name, Vec::new()).await?;
        Ok(())
    }

    /// Describes a key version.
    pub async fn describe_key(
        &self,
        name: &str,
        request: &DescribeKeyRequest,
    ) -> Result<KeyStatus, KmsError> {
        validate_name(name)?;
        self.call_decode(Api::DescribeKey, name, request).await
    }

    /// Lists key names in the enclave.
    pub async fn list_keys(&self, request: &ListRequest) -> Result<ListResponse, KmsError> {
        self.call_decode(Api::ListKeys, "", request).await
    }

    // ========================================================================
    // Envelope encryption
    // ========================================================================

    /// Encrypts a plaintext.
    pub async fn encrypt(
        &self,
        name: &str,
        request: &EncryptRequest,
    ) -> Result<EncryptResponse, KmsError> {
        validate_name(name)?;
        self.call_decode(Api::Encrypt, name, request).await
    }

    /// Decrypts a ciphertext.
    pub async fn decrypt(
        &self,
        name: &str,
        request: &DecryptRequest,
    ) -> Result<DecryptResponse, KmsError> {
        validate_name(name)?;
        self.call_decode(Api::Decrypt, name, request).await
    }

    /// Decrypts an envelope with the version it records.
    pub async fn decrypt_envelope(
        &self,
        name: &str,
        envelope: &Envelope,
        associated_data: impl Into<AssociatedData>,
    ) -> Result<DecryptResponse, KmsError> {
        let request = DecryptRequest::from_envelope(envelope, associated_data);
        self.decrypt(name, &request).await
    }

    /// Generates a data encryption key.
    ///
    /// # Errors
    ///
    /// A length above [`crate::key::MAX_DATA_KEY_LENGTH`] is rejected
    /// without contacting the server.
    pub async fn generate_key(
        &self,
        name: &str,
        request: &GenerateKeyRequest,
    ) -> Result<GenerateKeyResponse, KmsError> {
        validate_name(name)?;
        request.data_key_length()?;
        self.call_decode(Api::GenerateKey, name, request).await
    }

    /// Computes a MAC.
    pub async fn mac(&self, name: &str, request: &MacRequest) -> Result<MacResponse, KmsError> {
        validate_name(name)?;
        self.call_decode(Api::Mac, name, request).await
    }

    // ========================================================================
    // Plumbing
    // ========================================================================

    async fn call<Req: WireMapping>(
        &self,
        api: Api,
        name: &str,
        request: &Req,
    ) -> Result<(Vec<u8>, Encoding), KmsError> {
        let body = codec::encode(request, self.config.encoding)?;
        self.send(api, name, body).await
    }

    async fn call_decode<Req: WireMapping, Resp: WireMapping>(
        &self,
        api: Api,
        name: &str,
        request: &Req,
    ) -> Result<Resp, KmsError> {
        let (body, encoding) = self.call(api, name, request).await?;
        Ok(codec::decode(&body, encoding)?)
    }

    async fn send(
        &self,
        api: Api,
        name: &str,
        body: Vec<u8>,
    ) -> Result<(Vec<u8>, Encoding), KmsError> {
        let content_type = self.config.encoding.content_type();
        let request = Request {
            api,
            enclave: self.config.enclave.clone(),
            name: name.to_string(),
            content_type: content_type.to_string(),
            accept: content_type.to_string(),
            body,
        };

        debug!(
            method = api.method(),
            path = %request.path(),
            enclave = %self.config.enclave,
            content_type,
            "Sending request"
        );

        let response = self.transport.send(request).await?;
        let encoding = Encoding::from_content_type(&response.content_type);
        let status = response.status;
        let success = response.is_success();
        let body = codec::read_body(response.content_length, response.body)?;

        debug!(status, len = body.len(), "Received response");

        if !success {
            return Err(codec::decode_error(status, &body, encoding));
        }
        Ok((body, encoding))
    }
}
