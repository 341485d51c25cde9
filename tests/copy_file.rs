use std::fs;
use std::path::Path;

use sales_data_processing::copy::{copy_file, copy_file_with_stats, CopyOptions};
use sales_data_processing::EngineError;

fn write_source(dir: &Path, rows: usize) -> std::path::PathBuf {
    let path = dir.join("source.csv");
    let mut wtr = csv::Writer::from_path(&path).unwrap();
    wtr.write_record(["Country", "Item Type", "Total Profit"]).unwrap();
    for i in 0..rows {
        wtr.write_record([format!("C{i}"), "Snacks, salty".to_string(), format!("{i}.5")])
            .unwrap();
    }
    wtr.flush().unwrap();
    path
}

fn opts(workers: usize, batch_size: usize) -> CopyOptions {
    CopyOptions {
        worker_count: workers,
        batch_size,
        ..CopyOptions::default()
    }
}

#[test]
fn copy_writes_header_once_then_every_row() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), 23);
    let dest = dir.path().join("out").join("nested");

    let stats = copy_file_with_stats(&source, &dest, &opts(4, 5)).unwrap();
    assert_eq!(stats.rows, 23);
    assert_eq!(stats.batches, 5);
    assert!(stats.path.starts_with(&dest));
    assert_eq!(stats.bytes, fs::metadata(&stats.path).unwrap().len());

    let mut rdr = csv::Reader::from_path(&stats.path).unwrap();
    assert_eq!(
        rdr.headers().unwrap(),
        &csv::StringRecord::from(vec!["Country", "Item Type", "Total Profit"])
    );
    let mut countries: Vec<String> = rdr
        .records()
        .map(|r| {
            let r = r.unwrap();
            assert_eq!(&r[1], "Snacks, salty");
            r[0].to_string()
        })
        .collect();
    countries.sort();
    let mut expected: Vec<String> = (0..23).map(|i| format!("C{i}")).collect();
    expected.sort();
    assert_eq!(countries, expected);
}

#[test]
fn batches_stay_contiguous_in_output() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), 40);
    let written = copy_file(&source, dir.path().join("out"), &opts(8, 4)).unwrap();

    let mut rdr = csv::Reader::from_path(&written).unwrap();
    let ids: Vec<usize> = rdr
        .records()
        .map(|r| r.unwrap()[0].trim_start_matches('C').parse().unwrap())
        .collect();
    assert_eq!(ids.len(), 40);
    for block in ids.chunks(4) {
        let first = block[0];
        assert_eq!(first % 4, 0);
        assert_eq!(block, &[first, first + 1, first + 2, first + 3]);
    }
}

#[test]
fn header_only_source_copies_header() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), 0);
    let stats = copy_file_with_stats(&source, dir.path().join("out"), &CopyOptions::default()).unwrap();
    assert_eq!(stats.rows, 0);
    assert_eq!(stats.batches, 0);
    assert_eq!(
        fs::read_to_string(&stats.path).unwrap(),
        "Country,Item Type,Total Profit\n"
    );
}

#[test]
fn repeated_copies_get_distinct_files() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), 3);
    let dest = dir.path().join("out");
    let a = copy_file(&source, &dest, &CopyOptions::default()).unwrap();
    let b = copy_file(&source, &dest, &CopyOptions::default()).unwrap();
    assert_ne!(a, b);
    assert_eq!(fs::read(&a).unwrap(), fs::read(&b).unwrap());
}

#[test]
fn custom_prefix_names_the_output() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), 3);
    let options = CopyOptions {
        file_prefix: "sales_backup".to_string(),
        ..CopyOptions::default()
    };
    let written = copy_file(&source, dir.path(), &options).unwrap();
    let name = written.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("sales_backup_"));
    assert!(name.ends_with(".csv"));
}

#[test]
fn missing_source_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = copy_file(dir.path().join("nope.csv"), dir.path().join("out"), &CopyOptions::default())
        .unwrap_err();
    assert!(matches!(err, EngineError::Csv(_)));
    assert!(!dir.path().join("out").exists());
}

#[test]
fn zero_batch_size_is_rejected_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), 3);
    let err = copy_file(&source, dir.path().join("out"), &opts(4, 0)).unwrap_err();
    assert!(matches!(err, EngineError::Partition { .. }));
    assert!(!dir.path().join("out").exists());
}

#[test]
fn failed_copy_leaves_no_partial_file() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("broken.csv");
    let mut text = String::from("Country,Total Profit\n");
    for i in 0..10 {
        text.push_str(&format!("C{i},{i}\n"));
    }
    // One field too many: reading fails after ten good rows.
    text.push_str("C10,10,extra\n");
    text.push_str("C11,11\n");
    fs::write(&source, text).unwrap();

    let dest = dir.path().join("out");
    let err = copy_file(&source, &dest, &opts(2, 2)).unwrap_err();
    assert!(matches!(err, EngineError::Csv(_)), "{err}");
    assert_eq!(fs::read_dir(&dest).unwrap().count(), 0);
}

#[test]
fn non_utf8_bytes_are_copied_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("latin1.csv");
    fs::write(&source, b"Country,Total Profit\nCaf\xe9,1\nM\xfcnchen,2\nOslo,3\n").unwrap();

    let written = copy_file(&source, dir.path().join("out"), &opts(2, 1)).unwrap();
    let bytes = fs::read(&written).unwrap();
    let mut lines: Vec<&[u8]> = bytes.split(|b| *b == b'\n').filter(|l| !l.is_empty()).collect();
    assert_eq!(lines.remove(0), &b"Country,Total Profit"[..]);
    lines.sort();
    let expected: Vec<&[u8]> = vec![&b"Caf\xe9,1"[..], &b"M\xfcnchen,2"[..], &b"Oslo,3"[..]];
    assert_eq!(lines, expected);
}
