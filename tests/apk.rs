//! Extracting the `classes*.dex` series from an APK.

#![cfg(feature = "apk")]

mod common;

use std::io::{Cursor, Write};

use common::{DexBuilder, Ins};
use dexamine::{
    dex::apk::{read_dex_entries, ApkError},
    dex::DexReader,
    DexIndex, MethodFilter,
};
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

fn zip_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, bytes) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("dexamine-{}-{name}", std::process::id()))
}

#[test]
fn reads_the_dex_series_in_order() {
    let mut first = DexBuilder::new();
    let p_v = first.proto("V", &[]);
    let m = first.method("Lcom/demo/First;", "one", p_v);
    first.code(m, vec![Ins::ConstString("from-first"), Ins::ReturnVoid]);
    let first = first.build();

    let mut second = DexBuilder::new();
    let p_v = second.proto("V", &[]);
    let m = second.method("Lcom/demo/Second;", "two", p_v);
    second.code(m, vec![Ins::ConstString("from-second"), Ins::ReturnVoid]);
    let second = second.build();

    // classes3.dex is missing, so classes4.dex must not be picked up.
    let archive = zip_archive(&[
        ("classes2.dex", &second),
        ("classes.dex", &first),
        ("classes4.dex", &second),
        ("resources.arsc", b"not a dex"),
    ]);
    let path = temp_path("series.apk");
    std::fs::write(&path, archive).unwrap();

    let buffers = read_dex_entries(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(buffers.len(), 2);

    let readers = buffers
        .iter()
        .map(|b| DexReader::new(b).unwrap())
        .collect();
    let index = DexIndex::new(readers);
    assert_eq!(
        index
            .find_method_using_string("from-first", false, &MethodFilter::default(), &[], true)
            .len(),
        1
    );
    assert_eq!(
        index
            .find_method_using_string("from-second", false, &MethodFilter::default(), &[], true)
            .len(),
        1
    );
}

#[test]
fn archive_without_dex_is_an_error() {
    let archive = zip_archive(&[("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0")]);
    let path = temp_path("empty.apk");
    std::fs::write(&path, archive).unwrap();
    let result = read_dex_entries(&path);
    std::fs::remove_file(&path).unwrap();
    assert!(matches!(result, Err(ApkError::NoDex)));
}
