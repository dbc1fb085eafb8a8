//! CSV import scenarios: one inventory file, then sales against it.

use rust_decimal::Decimal;
use std::str::FromStr;
use steeltrack::balance::{balance, total_sold};
use steeltrack::import::{import_combined, import_inventory, import_sales};
use steeltrack::model::Dimension;
use steeltrack::{Session, Store, StoreConfig};

const INVENTORY_CSV: &str = "Entry Date,S.No,Type,Dimensions,Weight,Coating,Specifications,Item Form,LOT,Quality,Balance\n\
01/06/2024,100,E,1.50×120,500,ZincA,Grade1,Coil,LOT-X,Soft,500\n";

const DIALOG_HEADER: &str = "Sale Date,Dimensions,Sold To,Quantity Sold,Form,Entry Number,Item Type,Item Coating,Item Specifications,Item Form,Item LOT,Item Quality";

fn d(text: &str) -> Decimal {
    Decimal::from_str(text).unwrap()
}

fn session() -> Session {
    let store = Store::open_in_memory(StoreConfig::default().with_kdf_iterations(1_000)).unwrap();
    store.register_access_code("1234").unwrap()
}

fn balance_of(session: &Session, serial: &str) -> Decimal {
    let repo = session.repository();
    let lot = repo.find_by_serial(serial).unwrap().unwrap();
    balance(lot.weight, total_sold(repo.executor(), repo.crypto(), lot.id).unwrap())
}

#[test]
fn test_inventory_file_creates_one_lot() {
    let session = session();
    let outcome = import_inventory(&session.repository(), INVENTORY_CSV).unwrap();
    assert_eq!((outcome.succeeded, outcome.skipped, outcome.errored), (1, 0, 0));

    let lots = session.repository().list_stock_lots().unwrap();
    assert_eq!(lots.len(), 1);
    let lot = &lots[0];
    assert_eq!(lot.serial_number, "100");
    assert_eq!(lot.weight, d("500"));
    assert_eq!(lot.dimensions, vec![Dimension::new(d("1.50"), d("120"))]);
    assert_eq!(lot.dimensions[0].to_string(), "1.50×120");
}

#[test]
fn test_reimport_skips_existing_serial() {
    let session = session();
    import_inventory(&session.repository(), INVENTORY_CSV).unwrap();
    let again = import_inventory(&session.repository(), INVENTORY_CSV).unwrap();
    assert_eq!((again.succeeded, again.skipped), (0, 1));
    assert_eq!(session.repository().list_stock_lots().unwrap().len(), 1);
}

#[test]
fn test_sales_reduce_balance_and_over_sell_is_rejected() {
    let session = session();
    let repo = session.repository();
    import_inventory(&repo, INVENTORY_CSV).unwrap();

    let first = format!("{DIALOG_HEADER}\n01/07/2024,\"1.50×120\",\"Acme Co\",200,Coil,100,E,ZincA,Grade1,Coil,LOT-X,Soft\n");
    let outcome = import_sales(&repo, &first).unwrap();
    assert_eq!(outcome.succeeded, 1);
    assert_eq!(balance_of(&session, "100"), d("300"));

    let second = format!("{DIALOG_HEADER}\n02/07/2024,\"1.50×120\",\"Beta Ltd\",400,Coil,100,E,ZincA,Grade1,Coil,LOT-X,Soft\n");
    let outcome = import_sales(&repo, &second).unwrap();
    assert_eq!((outcome.succeeded, outcome.errored), (0, 1));
    assert!(outcome.messages[0].contains("exceeds remaining weight"));
    assert_eq!(balance_of(&session, "100"), d("300"));
}

#[test]
fn test_balance_never_negative_across_import_paths() {
    let session = session();
    let repo = session.repository();
    import_inventory(&repo, INVENTORY_CSV).unwrap();

    let header = "Entry Date,S.No,Type,Item Dimensions,Weight,Coating,Specifications,Item Form,LOT,Quality,Balance,Sale Date,Sale Dimensions,Sold To,Quantity Sold,Form";
    let combined = format!(
        "{header}\n\
         01/06/2024,100,E,1.50×120,500,ZincA,Grade1,Coil,LOT-X,Soft,500,03/07/2024,—,Acme Co,250,Coil\n\
         01/06/2024,100,E,1.50×120,500,ZincA,Grade1,Coil,LOT-X,Soft,500,04/07/2024,—,Beta Ltd,250,Coil\n\
         01/06/2024,101,GA,2×1000,80,,,Sheet,LOT-Y,Hard,80,05/07/2024,—,Acme Co,80,Sheet\n"
    );
    let outcome = import_combined(&repo, &combined).unwrap();
    assert_eq!(outcome.lots_created, 1);
    assert_eq!(outcome.sales_created, 3);
    assert_eq!(outcome.errored, 0);

    for lot in repo.list_with_balance(&Default::default()).unwrap() {
        assert!(lot.balance >= Decimal::ZERO, "{}", lot.lot.serial_number);
        assert_eq!(lot.balance, lot.lot.weight - lot.total_sold);
    }
    assert_eq!(balance_of(&session, "100"), Decimal::ZERO);
    assert_eq!(balance_of(&session, "101"), Decimal::ZERO);
}
