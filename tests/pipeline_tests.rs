use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::{RwLock, mpsc};

use reggis::core::ReggisError;
use reggis::pipeline::{CancelFlag, ProgressEvent, RunOptions, RunState, run_batch};
use reggis::store::{ClientRow, MaterialRow, ReferenceStore};
use tempfile::TempDir;

const CAC: &str = "urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2";
const CBC: &str = "urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2";

fn invoice_xml(number: &str, code: &str, buyer_nit: &str) -> String {
    format!(
        "<Invoice xmlns=\"urn:oasis:names:specification:ubl:schema:xsd:Invoice-2\" \
         xmlns:cac=\"{CAC}\" xmlns:cbc=\"{CBC}\">\
         <cbc:ID>{number}</cbc:ID>\
         <cbc:IssueDate>2024-03-15</cbc:IssueDate>\
         <cbc:DocumentCurrencyCode>COP</cbc:DocumentCurrencyCode>\
         <cac:AccountingSupplierParty><cac:Party><cac:PartyTaxScheme>\
           <cbc:RegistrationName>LACTALIS COLOMBIA S.A.S</cbc:RegistrationName>\
           <cbc:CompanyID>800245795</cbc:CompanyID>\
         </cac:PartyTaxScheme></cac:Party></cac:AccountingSupplierParty>\
         <cac:AccountingCustomerParty><cac:Party><cac:PartyTaxScheme>\
           <cbc:RegistrationName>TIENDA</cbc:RegistrationName>\
           <cbc:CompanyID>{buyer_nit}</cbc:CompanyID>\
         </cac:PartyTaxScheme></cac:Party></cac:AccountingCustomerParty>\
         <cac:InvoiceLine>\
           <cbc:InvoicedQuantity unitCode=\"KGM\">10</cbc:InvoicedQuantity>\
           <cac:TaxTotal><cac:TaxSubtotal><cac:TaxCategory>\
             <cbc:Percent>19</cbc:Percent>\
           </cac:TaxCategory></cac:TaxSubtotal></cac:TaxTotal>\
           <cac:Item>\
             <cbc:Description>LECHE ENTERA</cbc:Description>\
             <cac:SellersItemIdentification><cbc:ID>{code}</cbc:ID></cac:SellersItemIdentification>\
           </cac:Item>\
           <cac:Price><cbc:PriceAmount>3500</cbc:PriceAmount></cac:Price>\
         </cac:InvoiceLine>\
         </Invoice>"
    )
}

fn credit_note_xml() -> String {
    format!("<CreditNote xmlns:cbc=\"{CBC}\"><cbc:ID>NC1</cbc:ID></CreditNote>")
}

fn write_zip(path: &Path, members: &[(&str, &str)]) {
    let file = fs::File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    for (name, content) in members {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
}

fn empty_store(dir: &Path) -> RwLock<ReferenceStore> {
    RwLock::new(ReferenceStore::open(dir.join("store.json")).unwrap())
}

fn populated_store(dir: &Path, codes: &[&str], nits: &[&str]) -> RwLock<ReferenceStore> {
    let mut store = ReferenceStore::open(dir.join("store.json")).unwrap();
    store.import_materials(
        codes
            .iter()
            .enumerate()
            .map(|(i, code)| MaterialRow {
                line: i as u64 + 2,
                code: (*code).into(),
                description: "PRODUCTO".into(),
                entity: "Lactalis".into(),
            })
            .collect(),
    );
    store.import_clients(
        nits.iter()
            .enumerate()
            .map(|(i, nit)| ClientRow {
                line: i as u64 + 2,
                parent_code: format!("C{i:03}"),
                name: "CLIENTE".into(),
                tax_id: (*nit).into(),
            })
            .collect(),
    );
    RwLock::new(store)
}

fn setup_inputs(input: &Path) {
    fs::write(input.join("b_factura.xml"), invoice_xml("FE2", "1002", "900123456")).unwrap();
    fs::write(input.join("a_factura.xml"), invoice_xml("FE1", "1001", "900123456")).unwrap();
    write_zip(
        &input.join("lote.zip"),
        &[
            ("adentro.xml", &invoice_xml("FE3", "1003", "900123456")),
            ("nota.xml", &credit_note_xml()),
        ],
    );
    fs::write(input.join("roto.zip"), b"not a zip").unwrap();
    fs::write(input.join("leeme.txt"), b"ignorar").unwrap();
}

#[test]
fn batch_run_processes_all_units_in_scan_order() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in");
    let output = dir.path().join("out");
    fs::create_dir_all(&input).unwrap();
    setup_inputs(&input);

    let store = empty_store(dir.path());
    let report = run_batch(
        &RunOptions::new(&input, &output),
        &store,
        None,
        &CancelFlag::default(),
    )
    .unwrap();

    assert_eq!(report.units_total, 4);
    assert_eq!(report.units_processed, 4);
    assert_eq!(report.lines_extracted, 3);
    assert_eq!(report.lines_accepted, 3);
    assert_eq!(report.documents_skipped, 1);
    assert_eq!(report.unit_errors.len(), 1);
    assert!(report.unit_errors[0].0.contains("roto.zip"));
    assert!(!report.cancelled);

    let content = fs::read_to_string(report.output.unwrap()).unwrap();
    let invoices: Vec<&str> = content
        .lines()
        .skip(1)
        .map(|l| l.split(';').next().unwrap())
        .collect();
    // Sorted by file name: a_factura, b_factura, lote.zip
    assert_eq!(invoices, vec!["\"FE1\"", "\"FE2\"", "\"FE3\""]);
}

#[test]
fn validation_rejects_only_unknown_lines() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in");
    let output = dir.path().join("out");
    fs::create_dir_all(&input).unwrap();
    fs::write(input.join("a.xml"), invoice_xml("FE1", "1001", "900123456")).unwrap();
    fs::write(input.join("b.xml"), invoice_xml("FE2", "9999", "900123456")).unwrap();

    let store = populated_store(dir.path(), &["1001"], &["900123456"]);
    let mut options = RunOptions::new(&input, &output);
    options.validate_materials = true;
    options.validate_clients = true;

    let report = run_batch(&options, &store, None, &CancelFlag::default()).unwrap();
    assert_eq!(report.lines_extracted, 2);
    assert_eq!(report.lines_accepted, 1);
    assert_eq!(report.rejected_materials, 1);
    assert_eq!(report.rejected_clients, 0);
    assert_eq!(report.rejections.len(), 1);
    assert_eq!(report.rejections[0].0, "FE2");
}

#[test]
fn disabled_validation_accepts_everything() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in");
    fs::create_dir_all(&input).unwrap();
    fs::write(input.join("a.xml"), invoice_xml("FE1", "1001", "111")).unwrap();

    // Nothing registered at all, but validations are off.
    let store = empty_store(dir.path());
    let report = run_batch(
        &RunOptions::new(&input, dir.path().join("out")),
        &store,
        None,
        &CancelFlag::default(),
    )
    .unwrap();
    assert_eq!(report.lines_accepted, 1);
    assert_eq!(report.rejections.len(), 0);
}

#[test]
fn identical_inputs_produce_identical_exports() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in");
    fs::create_dir_all(&input).unwrap();
    setup_inputs(&input);
    let store = empty_store(dir.path());

    let mut contents = Vec::new();
    for out in ["out1", "out2"] {
        let mut options = RunOptions::new(&input, dir.path().join(out));
        options.workers = 4;
        let report = run_batch(&options, &store, None, &CancelFlag::default()).unwrap();
        contents.push(fs::read(report.output.unwrap()).unwrap());
    }
    assert_eq!(contents[0], contents[1]);
}

#[test]
fn empty_result_fails_the_run() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in");
    fs::create_dir_all(&input).unwrap();
    fs::write(input.join("nota.xml"), credit_note_xml()).unwrap();

    let store = empty_store(dir.path());
    let err = run_batch(
        &RunOptions::new(&input, dir.path().join("out")),
        &store,
        None,
        &CancelFlag::default(),
    )
    .unwrap_err();
    assert!(matches!(err, ReggisError::EmptyRun { units: 1 }));
}

#[test]
fn fully_rejected_run_fails_as_empty() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in");
    fs::create_dir_all(&input).unwrap();
    fs::write(input.join("a.xml"), invoice_xml("FE1", "9999", "111")).unwrap();

    // Nothing registered: validation rejects the one extracted line.
    let store = populated_store(dir.path(), &[], &[]);
    let mut options = RunOptions::new(&input, dir.path().join("out"));
    options.validate_materials = true;

    let err = run_batch(&options, &store, None, &CancelFlag::default()).unwrap_err();
    assert!(err.to_string().contains("no lines accepted"));
    assert!(matches!(err, ReggisError::EmptyRun { units: 1 }));
}

#[test]
fn missing_input_folder_is_fatal() {
    let dir = TempDir::new().unwrap();
    let store = empty_store(dir.path());
    let err = run_batch(
        &RunOptions::new(dir.path().join("no-such-dir"), dir.path().join("out")),
        &store,
        None,
        &CancelFlag::default(),
    )
    .unwrap_err();
    assert!(matches!(err, ReggisError::Io { .. }));
}

#[test]
fn cancellation_discards_output() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in");
    let output = dir.path().join("out");
    fs::create_dir_all(&input).unwrap();
    setup_inputs(&input);

    let cancel = CancelFlag::default();
    cancel.cancel();

    let store = empty_store(dir.path());
    let report = run_batch(&RunOptions::new(&input, &output), &store, None, &cancel).unwrap();
    assert!(report.cancelled);
    assert!(report.output.is_none());
    assert!(!output.exists() || fs::read_dir(&output).unwrap().next().is_none());
}

#[test]
fn progress_events_track_the_run() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in");
    fs::create_dir_all(&input).unwrap();
    fs::write(input.join("a.xml"), invoice_xml("FE1", "1001", "111")).unwrap();

    let store = empty_store(dir.path());
    let (tx, rx) = mpsc::channel();
    run_batch(
        &RunOptions::new(&input, dir.path().join("out")),
        &store,
        Some(&tx),
        &CancelFlag::default(),
    )
    .unwrap();
    drop(tx);

    let events: Vec<ProgressEvent> = rx.into_iter().collect();
    let states: Vec<RunState> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::State(s) => Some(*s),
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        vec![
            RunState::Scanning,
            RunState::Extracting,
            RunState::Validating,
            RunState::Writing,
            RunState::Done,
        ]
    );
    assert!(events.iter().any(|e| matches!(
        e,
        ProgressEvent::UnitDone { lines: 1, .. }
    )));
    assert!(matches!(
        events.last(),
        Some(ProgressEvent::Finished(report)) if report.lines_accepted == 1
    ));
}

#[test]
fn dropped_progress_receiver_does_not_fail_the_run() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in");
    fs::create_dir_all(&input).unwrap();
    fs::write(input.join("a.xml"), invoice_xml("FE1", "1001", "111")).unwrap();

    let store = empty_store(dir.path());
    let (tx, rx) = mpsc::channel();
    drop(rx);
    let report = run_batch(
        &RunOptions::new(&input, dir.path().join("out")),
        &store,
        Some(&tx),
        &CancelFlag::default(),
    )
    .unwrap();
    assert_eq!(report.lines_accepted, 1);
}
