//! Access code lifecycle and cipher behaviour across sessions.

use rust_decimal::Decimal;
use steeltrack::crypto::{FieldCipher, CIPHERTEXT_TAG};
use steeltrack::import::import_inventory;
use steeltrack::{DecryptFailure, InventoryError, Store, StoreConfig, StoreExecutor};

const ITERATIONS: u32 = 1_000;

fn store() -> Store {
    Store::open_in_memory(StoreConfig::default().with_kdf_iterations(ITERATIONS)).unwrap()
}

#[test]
fn test_encrypt_is_randomised_and_key_bound() {
    let right = FieldCipher::new("1234", ITERATIONS).unwrap();
    let wrong = FieldCipher::new("4321", ITERATIONS).unwrap();

    for text in ["Acme Co", "", "1.50×120", "ünïcödé ✓"] {
        let a = right.encrypt(text).unwrap();
        let b = right.encrypt(text).unwrap();
        assert!(a.starts_with(CIPHERTEXT_TAG));
        assert_ne!(a, b);
        assert_eq!(right.decrypt(&a).unwrap(), text);
        assert_eq!(wrong.decrypt(&a), Err(DecryptFailure::Authentication));
    }
}

#[test]
fn test_login_logout_and_wrong_code() {
    let session = store().register_access_code("1234").unwrap();
    let repo = session.repository();
    import_inventory(
        &repo,
        "Entry Date,S.No,Type,Dimensions,Weight,Coating,Specifications,Item Form,LOT,Quality,Balance\n\
         01/06/2024,100,E,1.50×120,500,ZincA,Grade1,Coil,LOT-X,Soft,500\n",
    )
    .unwrap();

    let stored = session
        .store()
        .executor()
        .query_one("SELECT serial_number, weight FROM stock_lots", &[])
        .unwrap();
    assert!(stored.get_string(0).unwrap().starts_with(CIPHERTEXT_TAG));
    assert!(stored.get_string(1).unwrap().starts_with(CIPHERTEXT_TAG));

    let store = session.logout();
    assert!(!store.verify_access_code("0000").unwrap());
    let store = match store.login("0000") {
        Err(InventoryError::InvalidAccessCode) => Store::open_in_memory(StoreConfig::default()).unwrap(),
        other => panic!("expected InvalidAccessCode, got {:?}", other.err()),
    };
    assert!(matches!(store.login("1234"), Err(InventoryError::NotRegistered)));
}

#[test]
fn test_rekey_keeps_data_readable() {
    let mut session = store().register_access_code("1234").unwrap();
    import_inventory(
        &session.repository(),
        "Entry Date,S.No,Type,Dimensions,Weight,Coating,Specifications,Item Form,LOT,Quality,Balance\n\
         01/06/2024,100,E,1.50×120,500,ZincA,Grade1,Coil,LOT-X,Soft,500\n",
    )
    .unwrap();

    assert!(session.rekey("9876").unwrap() > 0);
    let store = session.logout();
    assert!(matches!(store.verify_access_code("1234"), Ok(false)));

    let session = store.login("9876").unwrap();
    let lot = session.repository().find_by_serial("100").unwrap().unwrap();
    assert_eq!(lot.weight, Decimal::from(500));
}
