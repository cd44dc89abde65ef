use helpers::{
    provider::EncryptionService, AccountIndex, Address, DevNetwork, Plaintext, Session,
};
use proptest::prelude::*;
use tests::{deploy_counter_fixture, test_config, ADMIN};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn round_trip_preserves_every_u32(value in any::<u32>(), address in any::<[u8; 20]>()) {
        let rt = runtime();
        let address = Address(address);
        let session: Session = rt.block_on(async {
            let devnet = DevNetwork::ephemeral().await.unwrap();
            devnet.create_session(&address).await.unwrap()
        });

        let ciphertext = session.encrypt(Plaintext::from(value)).unwrap();
        prop_assert_eq!(session.decrypt(&address, &ciphertext).unwrap(), Plaintext::from(value));
        prop_assert_eq!(session.decrypt(&address, &ciphertext).unwrap(), Plaintext::from(value));
    }

    #[test]
    fn values_above_u32_are_rejected(value in (u64::from(u32::MAX) + 1)..=u64::MAX) {
        let key = helpers::devnet::NetworkKey::generate();
        let session = Session::new(Address([7; 20]), key.public_handle());
        prop_assert!(session.encrypt(Plaintext(value)).is_err());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn increments_compose_linearly(amounts in prop::collection::vec(0u64..1_000_000, 1..4)) {
        let total = runtime().block_on(async {
            let fixture = deploy_counter_fixture(&test_config()).await.unwrap();
            for amount in &amounts {
                fixture
                    .env
                    .add_count(&fixture.address, ADMIN, Plaintext(*amount))
                    .await
                    .unwrap();
            }
            fixture.env.get_count(&fixture.address, AccountIndex(1)).await.unwrap()
        });
        prop_assert_eq!(total, Plaintext(amounts.iter().sum()));
    }
}
