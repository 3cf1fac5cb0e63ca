//! Integration tests for the KMS protocol.
//!
//! These tests drive a node through the protocol client end to end: every
//! request and response is encoded, routed and decoded exactly as it would
//! be over the network, in both the binary and the JSON encoding.

// Allow unwrap() in tests - panics are acceptable for test assertions
#![allow(clippy::disallowed_methods)]

use std::collections::HashMap;
use std::sync::Arc;

use kms_keyring::EngineConfig;
use kms_protocol::{Client, ClientConfig, Encoding, NodeId};
use kms_server::{LoopbackTransport, Node, NodeConfig};

// ============================================================================
// Test Node
// ============================================================================

/// A node under test together with a client talking to it.
pub struct TestNode {
    pub node: Arc<Node>,
    pub client: Client<LoopbackTransport>,
}

impl TestNode {
    /// Starts a single-node cluster.
    pub fn start(encoding: Encoding) -> Self {
        Self::with_config(NodeConfig::default(), encoding)
    }

    /// Starts a node whose list pages hold at most `limit` names.
    pub fn with_list_limit(limit: usize, encoding: Encoding) -> Self {
        let config = NodeConfig {
            engine: EngineConfig {
                default_list_limit: limit,
                ..Default::default()
            },
            ..Default::default()
        };
        Self::with_config(config, encoding)
    }

    /// Starts node 0 of a cluster with the given peers.
    pub fn with_peers(peers: &[(NodeId, &str)], encoding: Encoding) -> Self {
        let config = NodeConfig {
            peers: peers
                .iter()
                .map(|(id, addr)| (*id, addr.to_string()))
                .collect::<HashMap<_, _>>(),
            ..Default::default()
        };
        Self::with_config(config, encoding)
    }

    /// Starts a node with an explicit configuration.
    pub fn with_config(config: NodeConfig, encoding: Encoding) -> Self {
        let node = Arc::new(Node::new(config));
        let client = Client::new(
            LoopbackTransport::new(Arc::clone(&node)),
            ClientConfig {
                encoding,
                ..Default::default()
            },
        );
        Self { node, client }
    }
}

/// Both wire encodings.
pub const ENCODINGS: [Encoding; 2] = [Encoding::Binary, Encoding::Json];

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use kms_protocol::key::{DEFAULT_DATA_KEY_LENGTH, MAX_DATA_KEY_LENGTH};
    use kms_protocol::{
        AddKeyVersionRequest, AssociatedData, CreateKeyRequest, DecryptRequest,
        DescribeKeyRequest, EditClusterRequest, EncryptRequest, ErrorKind, GenerateKeyRequest,
        KeyType, KmsError, ListRequest, MacRequest, RemoveKeyVersionRequest, Role, VersionRef,
    };

    use super::*;

    fn v(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    fn encrypt(plaintext: &[u8], ad: &str) -> EncryptRequest {
        EncryptRequest {
            version: VersionRef::Latest,
            plaintext: plaintext.to_vec(),
            associated_data: ad.into(),
        }
    }

    async fn key_with_versions(client: &Client<LoopbackTransport>, name: &str, versions: u32) {
        client
            .create_key(name, &CreateKeyRequest::default())
            .await
            .unwrap();
        for _ in 1..versions {
            client
                .add_key_version(name, &AddKeyVersionRequest::default())
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_encrypt_uses_latest_of_three_versions() {
        for encoding in ENCODINGS {
            let t = TestNode::start(encoding);
            key_with_versions(&t.client, "orders", 3).await;

            let envelope = t
                .client
                .encrypt("orders", &encrypt(b"card data", "order-42"))
                .await
                .unwrap();
            assert_eq!(envelope.version, v(3));

            let plaintext = t
                .client
                .decrypt_envelope("orders", &envelope, "order-42")
                .await
                .unwrap()
                .plaintext;
            assert_eq!(plaintext, b"card data");

            // The same ciphertext under another version does not authenticate.
            let err = t
                .client
                .decrypt(
                    "orders",
                    &DecryptRequest {
                        version: v(2),
                        ciphertext: envelope.ciphertext.clone(),
                        associated_data: "order-42".into(),
                    },
                )
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Integrity);
        }
    }

    #[tokio::test]
    async fn test_old_versions_keep_decrypting() {
        for encoding in ENCODINGS {
            let t = TestNode::start(encoding);
            key_with_versions(&t.client, "k", 1).await;

            let old = t.client.encrypt("k", &encrypt(b"v1 data", "")).await.unwrap();
            t.client
                .add_key_version("k", &AddKeyVersionRequest::default())
                .await
                .unwrap();
            let new = t.client.encrypt("k", &encrypt(b"v2 data", "")).await.unwrap();

            assert_eq!(old.version, v(1));
            assert_eq!(new.version, v(2));
            assert_eq!(
                t.client
                    .decrypt_envelope("k", &old, AssociatedData::empty())
                    .await
                    .unwrap()
                    .plaintext,
                b"v1 data"
            );

            // Removing the version makes its ciphertexts unrecoverable.
            t.client
                .remove_key_version(
                    "k",
                    &RemoveKeyVersionRequest {
                        version: VersionRef::Exact(v(1)),
                    },
                )
                .await
                .unwrap();
            let err = t
                .client
                .decrypt_envelope("k", &old, AssociatedData::empty())
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound);
        }
    }

    #[tokio::test]
    async fn test_associated_data_must_match() {
        for encoding in ENCODINGS {
            let t = TestNode::start(encoding);
            key_with_versions(&t.client, "k", 1).await;

            let envelope = t.client.encrypt("k", &encrypt(b"secret", "tenant-a")).await.unwrap();

            let err = t
                .client
                .decrypt_envelope("k", &envelope, "tenant-b")
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Integrity);

            let err = t
                .client
                .decrypt_envelope("k", &envelope, AssociatedData::empty())
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Integrity);
        }
    }

    #[tokio::test]
    async fn test_ciphertext_bound_to_key_name() {
        let t = TestNode::start(Encoding::Binary);
        key_with_versions(&t.client, "a", 1).await;
        key_with_versions(&t.client, "b", 1).await;

        let envelope = t.client.encrypt("a", &encrypt(b"data", "")).await.unwrap();
        let err = t
            .client
            .decrypt_envelope("b", &envelope, AssociatedData::empty())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);
    }

    #[tokio::test]
    async fn test_generate_key_lengths() {
        for encoding in ENCODINGS {
            let t = TestNode::start(encoding);
            key_with_versions(&t.client, "k", 1).await;

            for (length, expected) in [
                (None, DEFAULT_DATA_KEY_LENGTH),
                (Some(0), DEFAULT_DATA_KEY_LENGTH),
                (Some(16), 16),
                (Some(MAX_DATA_KEY_LENGTH), MAX_DATA_KEY_LENGTH),
            ] {
                let key = t
                    .client
                    .generate_key(
                        "k",
                        &GenerateKeyRequest {
                            version: VersionRef::Latest,
                            associated_data: "dek".into(),
                            length,
                        },
                    )
                    .await
                    .unwrap();
                assert_eq!(key.plaintext.len(), expected as usize);

                let recovered = t
                    .client
                    .decrypt_envelope("k", &key.envelope(), "dek")
                    .await
                    .unwrap();
                assert_eq!(recovered.plaintext, key.plaintext);
            }
        }
    }

    #[tokio::test]
    async fn test_generate_key_too_long_rejected_locally() {
        let t = TestNode::start(Encoding::Json);
        key_with_versions(&t.client, "k", 1).await;
        let commits = t.node.commit_count();

        let err = t
            .client
            .generate_key(
                "k",
                &GenerateKeyRequest {
                    length: Some(MAX_DATA_KEY_LENGTH + 1),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, KmsError::InvalidKeyLength(1025)));
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert_eq!(t.node.commit_count(), commits);
    }

    #[tokio::test]
    async fn test_mac_per_version() {
        for encoding in ENCODINGS {
            let t = TestNode::start(encoding);
            key_with_versions(&t.client, "k", 2).await;

            let mac = |version| MacRequest {
                version,
                message: b"message".to_vec(),
            };
            let latest = t.client.mac("k", &mac(VersionRef::Latest)).await.unwrap();
            let again = t.client.mac("k", &mac(VersionRef::Exact(v(2)))).await.unwrap();
            let first = t.client.mac("k", &mac(VersionRef::Exact(v(1)))).await.unwrap();

            assert_eq!(latest.version, v(2));
            assert_eq!(latest.mac, again.mac);
            assert_ne!(latest.mac, first.mac);
        }
    }

    #[tokio::test]
    async fn test_describe_key() {
        for encoding in ENCODINGS {
            let t = TestNode::start(encoding);
            t.client
                .create_key(
                    "k",
                    &CreateKeyRequest {
                        key_type: Some(KeyType::ChaCha20),
                    },
                )
                .await
                .unwrap();
            t.client
                .add_key_version("k", &AddKeyVersionRequest::default())
                .await
                .unwrap();

            let latest = t
                .client
                .describe_key("k", &DescribeKeyRequest::default())
                .await
                .unwrap();
            assert_eq!(latest.name, "k");
            assert_eq!(latest.version, v(2));
            assert_eq!(latest.key_type, KeyType::Aes256);
            assert_eq!(latest.created_by, "root");

            let first = t
                .client
                .describe_key(
                    "k",
                    &DescribeKeyRequest {
                        version: VersionRef::Exact(v(1)),
                    },
                )
                .await
                .unwrap();
            assert_eq!(first.key_type, KeyType::ChaCha20);
            assert!(first.created_at <= latest.created_at);
        }
    }

    #[tokio::test]
    async fn test_list_keys_in_pages() {
        for encoding in ENCODINGS {
            let t = TestNode::with_list_limit(2, encoding);
            for name in ["app-a", "app-b", "app-c", "db-a", "db-b"] {
                key_with_versions(&t.client, name, 1).await;
            }

            let mut request = ListRequest::with_prefix("app-");
            let mut names = Vec::new();
            let mut pages = 0;
            loop {
                let page = t.client.list_keys(&request).await.unwrap();
                pages += 1;
                names.extend(page.items.clone());
                match request.next_page(&page) {
                    Some(next) => request = next,
                    None => break,
                }
            }

            assert_eq!(names, vec!["app-a", "app-b", "app-c"]);
            assert_eq!(pages, 2);

            let all = t
                .client
                .list_keys(&ListRequest {
                    limit: 10,
                    ..Default::default()
                })
                .await
                .unwrap();
            assert_eq!(all.items.len(), 5);
            assert!(all.continue_at.is_empty());
        }
    }

    #[tokio::test]
    async fn test_enclaves_isolate_keys() {
        for encoding in ENCODINGS {
            let t = TestNode::start(encoding);
            t.client.create_enclave("tenant").await.unwrap();
            let tenant = t.client.with_enclave("tenant");

            key_with_versions(&tenant, "k", 1).await;
            let envelope = tenant.encrypt("k", &encrypt(b"data", "")).await.unwrap();

            // The default enclave has no such key.
            let err = t
                .client
                .decrypt_envelope("k", &envelope, AssociatedData::empty())
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound);

            let enclaves = t.client.list_enclaves(&ListRequest::default()).await.unwrap();
            assert_eq!(enclaves.items, vec!["default", "tenant"]);

            t.client.delete_enclave("tenant").await.unwrap();
            let err = tenant.list_keys(&ListRequest::default()).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound);
        }
    }

    #[tokio::test]
    async fn test_error_kinds() {
        for encoding in ENCODINGS {
            let t = TestNode::start(encoding);
            key_with_versions(&t.client, "k", 1).await;

            let err = t
                .client
                .create_key("k", &CreateKeyRequest::default())
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::AlreadyExists);

            let err = t.client.encrypt("missing", &encrypt(b"x", "")).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound);

            let err = t
                .client
                .encrypt(
                    "k",
                    &EncryptRequest {
                        version: VersionRef::Exact(v(9)),
                        ..encrypt(b"x", "")
                    },
                )
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound);

            let err = t
                .client
                .encrypt("bad name", &encrypt(b"x", ""))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidRequest);

            let err = t
                .client
                .decrypt(
                    "k",
                    &DecryptRequest {
                        version: v(1),
                        ciphertext: vec![0; 48],
                        associated_data: AssociatedData::empty(),
                    },
                )
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Integrity);
            assert!(matches!(err, KmsError::Server { status: 422, .. }));
        }
    }

    #[tokio::test]
    async fn test_oversized_plaintext_rejected() {
        let config = NodeConfig {
            engine: EngineConfig {
                max_plaintext_len: 16,
                ..Default::default()
            },
            ..Default::default()
        };
        let t = TestNode::with_config(config, Encoding::Binary);
        key_with_versions(&t.client, "k", 1).await;

        let err = t.client.encrypt("k", &encrypt(&[0; 17], "")).await.unwrap_err();
        assert!(matches!(err, KmsError::Server { status: 413, .. }));
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[tokio::test]
    async fn test_single_node_status() {
        for encoding in ENCODINGS {
            let t = TestNode::start(encoding);
            key_with_versions(&t.client, "k", 2).await;

            let status = t.client.status().await.unwrap();
            assert_eq!(status.leader(), Some(0));
            assert!(status.quorum_reachable());
            assert!(status.nodes_down.is_empty());

            let own = &status.nodes_up[&0];
            assert_eq!(own.role, Role::Leader);
            assert_eq!(own.commit, 2);
            assert_eq!(own.api_version, "v1");
            assert!(own.heartbeat_healthy());
            assert!(own.timing_balanced());
        }
    }

    #[tokio::test]
    async fn test_cluster_partition_and_edit() {
        for encoding in ENCODINGS {
            let t = TestNode::with_peers(&[(1, "10.0.0.2:7373"), (2, "10.0.0.3:7373")], encoding);

            let mut peer = t.node.node_status().await;
            peer.id = 1;
            peer.endpoint = "10.0.0.2:7373".to_string();
            peer.role = Role::Leader;
            peer.leader = Some(1);
            t.node.record_peer_status(peer).await;
            t.node.set_role(Role::Follower, Some(1)).await;

            let status = t.client.status().await.unwrap();
            assert!(status.is_up(0));
            assert!(status.is_up(1));
            assert!(status.is_down(2));
            assert_eq!(status.nodes_down[&2], "10.0.0.3:7373");
            assert_eq!(status.leader(), Some(1));
            assert!(status.quorum_reachable());

            t.client
                .edit_cluster(&EditClusterRequest {
                    remove_ids: vec![2],
                })
                .await
                .unwrap();

            let status = t.client.status().await.unwrap();
            assert_eq!(status.members().into_iter().collect::<Vec<_>>(), vec![0, 1]);
            assert!(status.nodes_down.is_empty());
        }
    }

    #[tokio::test]
    async fn test_status_with_self_in_peer_table() {
        for encoding in ENCODINGS {
            let t = TestNode::with_peers(
                &[(0, "10.0.0.1:7373"), (1, "10.0.0.2:7373"), (2, "10.0.0.3:7373")],
                encoding,
            );

            let status = t.client.status().await.unwrap();
            assert!(status.is_up(0));
            assert!(!status.is_down(0));
            assert!(status.is_down(1));
            assert!(status.is_down(2));
            assert_eq!(status.members().len(), 3);
            assert_eq!(status.nodes_up[&0].role, Role::Follower);
        }
    }

    #[tokio::test]
    async fn test_follower_without_leader_reports_none() {
        let t = TestNode::with_peers(&[(1, "10.0.0.2:7373")], Encoding::Json);

        let status = t.client.status().await.unwrap();
        let own = &status.nodes_up[&0];
        assert_eq!(own.role, Role::Follower);
        assert_eq!(own.leader, None);
        assert_eq!(own.leader_id(), -1);
        assert_eq!(status.leader(), None);
        assert!(!status.quorum_reachable());
    }
}
