use std::collections::HashMap;

use dpos_account::Account;
use dpos_cache::MemoryStore;
use dpos_core::crypto::{generate_keypair, Hash256, PrivateKey, Signature};
use dpos_core::ids::{KeyId, RegId};
use dpos_core::time::get_timestamp;
use dpos_core::wire::{BlockIndex, PbftMessage, PbftMsgType};
use dpos_finality::{BroadcastConfig, FinalityConfig, PeerBus, Signer};
use dpos_governance::{put_account, seed_governors, BpSizeProposal, ProposalPayload, ProposalStatus};
use dpos_node::{Node, NoopVm};
use dpos_test_suite::{generate_bp_keys, setup_test};
use parking_lot::Mutex;

struct KeyedSigner(HashMap<RegId, PrivateKey>);

#[async_trait::async_trait]
impl Signer for KeyedSigner {
    async fn sign_pbft(&self, miner: RegId, content_hash: Hash256) -> Option<Signature> {
        self.0.get(&miner).and_then(|key| Signature::sign(content_hash, key).ok())
    }
}

#[derive(Default)]
struct RecordingBus(Mutex<Vec<PbftMessage>>);

#[async_trait::async_trait]
impl PeerBus for RecordingBus {
    async fn broadcast_pbft(&self, msg: PbftMessage) {
        self.0.lock().push(msg);
    }
}

fn signed_message(
    msg_type: PbftMsgType,
    height: u32,
    block_hash: Hash256,
    prev_hash: Hash256,
    regid: RegId,
    key: &PrivateKey,
) -> PbftMessage {
    let mut m = PbftMessage {
        msg_type,
        height,
        block_hash,
        prev_block_hash: prev_hash,
        miner: regid,
        signature: Signature::sign(Hash256::zero(), key).unwrap(),
    };
    let hash = m.content_hash();
    m.signature = Signature::sign(hash, key).unwrap();
    m
}

/// Walks a freshly assembled node through a confirm round that crosses local
/// quorum, a finality round that crosses global quorum, and a governance
/// proposal that submits, approves, and executes against the same cache —
/// the full path a real node drives these subsystems through each block.
#[tokio::test]
async fn node_advances_finality_and_executes_a_governance_proposal() {
    setup_test();
    let bps = generate_bp_keys(3);

    let genesis = BlockIndex::genesis(Hash256::hash("genesis"), get_timestamp() - 1_000_000);
    let mut node = Node::new(genesis.clone(), MemoryStore::new(), FinalityConfig::default());
    node.rotate_delegates(bps.iter().map(|(regid, _, _)| (*regid, 1)).collect(), 0).unwrap();
    node.set_broadcast_config(BroadcastConfig { enabled: true, confirm_min_age_secs: 60 });
    node.set_initial_block_download(false);
    node.set_self_miner(Some(bps[0].0));

    node.with_cache_mut(|cache| {
        for (regid, pubkey, _) in &bps {
            let mut account = Account::new(KeyId::from_pubkey(pubkey));
            account.regid = Some(*regid);
            account.owner_pubkey = *pubkey;
            put_account(cache, &account).unwrap();
        }
        seed_governors(cache, &[bps[0].0]).unwrap();
    });

    let b1 = BlockIndex {
        height: 1,
        hash: Hash256::hash("b1"),
        prev_hash: genesis.hash,
        block_time: get_timestamp() - 500_000,
    };
    node.on_new_tip(b1.clone()).unwrap();

    let mut keymap = HashMap::new();
    for (regid, _, key) in &bps {
        keymap.insert(*regid, key.clone());
    }
    let signer = KeyedSigner(keymap);
    let bus = RecordingBus::default();

    for (regid, _, key) in &bps[0..2] {
        let msg = signed_message(PbftMsgType::Confirm, 1, b1.hash, b1.prev_hash, *regid, key);
        node.on_confirm_message(msg, &signer, &bus).await.unwrap();
    }
    assert_eq!(node.finality().local_final().height, 1);
    assert!(!bus.0.lock().is_empty(), "local advance should have broadcast a finality message");

    for (regid, _, key) in &bps[0..2] {
        let msg = signed_message(PbftMsgType::Finality, 1, b1.hash, b1.prev_hash, *regid, key);
        node.on_finality_message(msg).unwrap();
    }
    assert_eq!(node.finality().global_final().height, 1);

    let proposer = bps[0].0;
    let id = node
        .submit_proposal(
            ProposalPayload::BpSize(BpSizeProposal { new_size: 5, effective_height: 1 + 200 }),
            proposer,
            1,
        )
        .unwrap();
    assert!(node.approve_proposal(id, proposer).unwrap());

    let receipts = node.execute_block(&NoopVm, 2, get_timestamp()).await.unwrap();
    assert!(receipts.is_empty());
    assert_eq!(node.governance().get(&id).unwrap().status, ProposalStatus::Executed);
}
