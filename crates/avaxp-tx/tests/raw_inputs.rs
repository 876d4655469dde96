//! Builders fed from loosely typed external inputs: indexer UTXO records,
//! bech32 owner strings and JSON network configs.

use avaxp_tx::{BuildCommon, ExportInPBuilder, Keys, PrivateKey, RawUtxo, TxError, UnsignedTx};
use avaxp_types::{format_address, Id, NetworkParams};

fn keys() -> [PrivateKey; 3] {
    [
        PrivateKey::from_bytes(&[0x61; 32]).expect("key"),
        PrivateKey::from_bytes(&[0x62; 32]).expect("key"),
        PrivateKey::from_bytes(&[0x63; 32]).expect("key"),
    ]
}

fn owner_strings(hrp: &str) -> Vec<String> {
    keys()
        .iter()
        .map(|k| k.address_string(hrp, "P").expect("bech32"))
        .collect()
}

fn raw_utxo_json(amount: &str, owners: &[String]) -> String {
    serde_json::json!({
        "outputID": 7,
        "amount": amount,
        "txid": Id::new([0x70; 32]).to_cb58(),
        "outputidx": "0",
        "addresses": owners,
        "threshold": 2,
    })
    .to_string()
}

/// Two records as an indexer delivers them: cb58 output indices, bech32 owners.
const INDEXER_RECORDS: &str = r#"[
    {
        "outputID": 7,
        "amount": "1000000000",
        "txid": "bqUUWvo1X26pBx6wHTcmEAYivCM593RK5zgFT125XzrqZVb33",
        "outputidx": "111AZw1it",
        "addresses": [
            "P-fuji1yzpfsdalhfwkq2ceewgs9wv7k0uft40ydpuj59",
            "P-fuji103cmntssp6qnucejahddy42wcy4qty0uj42822",
            "P-fuji1hdk7ntw0huhqmlhlheme9t7scsy9lhfhw3ywy4"
        ],
        "threshold": 2
    },
    {
        "outputID": 7,
        "amount": "592941553",
        "txid": "2reRs3xLpo6jhy6d5F9uiHQ1uHyZQmh5G7phSdwCPD5LBNoHdU",
        "outputidx": "1111XiaYg",
        "addresses": [
            "P-fuji1yzpfsdalhfwkq2ceewgs9wv7k0uft40ydpuj59",
            "P-fuji103cmntssp6qnucejahddy42wcy4qty0uj42822",
            "P-fuji1hdk7ntw0huhqmlhlheme9t7scsy9lhfhw3ywy4"
        ],
        "threshold": 2
    }
]"#;

#[test]
fn test_export_from_indexer_records() {
    let params = NetworkParams::avax_fuji().expect("preset");
    let raw: Vec<RawUtxo> = serde_json::from_str(INDEXER_RECORDS).expect("indexer json");
    let owners = raw[0].addresses.clone();

    let tx = ExportInPBuilder::new(params.clone())
        .set_owner_addresses(&owners)
        .expect("owners")
        .set_raw_utxos(&raw)
        .expect("utxos")
        .set_amount(1_000_000_000)
        .set_destination_chain(&params.c_chain_id.to_cb58())
        .build()
        .expect("build");

    let UnsignedTx::PlatformExport(body) = &tx.unsigned else {
        panic!("expected export");
    };
    assert_eq!(body.base.outputs[0].amount, 591_941_553);
    let spent: Vec<(String, u32)> = body
        .base
        .inputs
        .iter()
        .map(|i| (hex::encode(&i.tx_id.as_bytes()[..4]), i.output_index))
        .collect();
    assert_eq!(
        spent,
        vec![("4f194d8e".to_string(), 1), ("f46bffcd".to_string(), 0)]
    );
    for input in &body.base.inputs {
        assert_eq!(input.sig_indices, vec![0, 1]);
    }
}

#[test]
fn test_indexer_record_missing_amount() {
    let params = NetworkParams::avax_fuji().expect("preset");
    let mut value: serde_json::Value =
        serde_json::from_str(&raw_utxo_json("1", &owner_strings("fuji"))).expect("json");
    value.as_object_mut().expect("object").remove("amount");
    let raw: RawUtxo = serde_json::from_value(value).expect("raw utxo");
    let err = ExportInPBuilder::new(params)
        .set_raw_utxos(&[raw])
        .expect_err("missing amount");
    assert!(matches!(err, TxError::UtxoMissingField("amount")));
}

#[test]
fn test_owner_from_other_network_rejected() {
    let params = NetworkParams::avax_fuji().expect("preset");
    let mainnet_owners = owner_strings("avax");
    assert!(matches!(
        ExportInPBuilder::new(params).set_owner_addresses(&mainnet_owners),
        Err(TxError::Address(_))
    ));
}

#[test]
fn test_network_params_from_json() {
    let mut params = NetworkParams::avax_fuji().expect("preset");
    params.tx_fee = 2_000_000;
    let custom = NetworkParams::from_json(&params.to_json()).expect("round-trip config");
    assert_eq!(custom.tx_fee, 2_000_000);

    let owners = owner_strings(&custom.hrp);
    let utxo_owner = keys()[0].address();
    assert_eq!(
        format_address("P", &custom.hrp, &utxo_owner).expect("format"),
        owners[0]
    );

    let raw: RawUtxo =
        serde_json::from_str(&raw_utxo_json("1000000000", &owners)).expect("indexer json");
    let tx = ExportInPBuilder::new(custom.clone())
        .set_owner_addresses(&owners)
        .expect("owners")
        .set_raw_utxos(&[raw])
        .expect("utxos")
        .set_amount(500_000_000)
        .set_destination_chain(&custom.c_chain_id.to_cb58())
        .build()
        .expect("build");
    assert_eq!(tx.fee_amount(), 2_000_000);
}
