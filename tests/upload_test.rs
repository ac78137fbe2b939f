mod common;

use common::{twiss_upload, TWISS};
use std::io::Write;
use tempfile::TempDir;
use tfsview::upload::LoadError;
use tfsview::{evaluate, Inputs, Loader, SessionState, TfsLoader, UploadedFile};

fn scratch_entries(dir: &TempDir) -> usize {
    std::fs::read_dir(dir.path()).unwrap().count()
}

#[test]
fn transient_file_is_gone_after_a_successful_load() {
    let scratch = TempDir::new().unwrap();
    let loader = TfsLoader {
        scratch_dir: Some(scratch.path().to_path_buf()),
    };
    let table = loader.load(&twiss_upload(), None).unwrap();
    assert_eq!(table.height(), 4);
    assert_eq!(scratch_entries(&scratch), 0);
}

#[test]
fn transient_file_is_gone_after_a_failed_load() {
    let scratch = TempDir::new().unwrap();
    let loader = TfsLoader {
        scratch_dir: Some(scratch.path().to_path_buf()),
    };
    let upload = UploadedFile::new("broken.tfs", b"* A B\n$ %d %d\n1\n".to_vec());
    let err = loader.load(&upload, None).unwrap_err();
    assert!(matches!(err, LoadError::Parse(_)));
    assert_eq!(scratch_entries(&scratch), 0);
}

#[test]
fn unwritable_scratch_dir_is_an_io_error() {
    let scratch = TempDir::new().unwrap();
    let loader = TfsLoader {
        scratch_dir: Some(scratch.path().join("missing")),
    };
    let err = loader.load(&twiss_upload(), None).unwrap_err();
    assert!(matches!(err, LoadError::Io(_)));
}

#[test]
fn bzip2_and_xz_uploads_are_detected() {
    let mut bz = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
    bz.write_all(TWISS.as_bytes()).unwrap();
    let bz = bz.finish().unwrap();

    let mut xz = xz2::write::XzEncoder::new(Vec::new(), 6);
    xz.write_all(TWISS.as_bytes()).unwrap();
    let xz = xz.finish().unwrap();

    for (name, bytes) in [("twiss.tfs.bz2", bz), ("twiss.tfs.xz", xz)] {
        let upload = UploadedFile::new(name, bytes);
        let table = TfsLoader::default().load(&upload, None).unwrap();
        assert_eq!(table.height(), 4, "{}", name);
        assert_eq!(table.headers.len(), 3, "{}", name);
    }
}

#[test]
fn file_on_disk_uses_its_extension() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("twiss.tfs.gz");
    let file = std::fs::File::create(&path).unwrap();
    let mut gz = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    gz.write_all(TWISS.as_bytes()).unwrap();
    gz.finish().unwrap();

    let upload = UploadedFile::from_path(&path).unwrap();
    assert_eq!(upload.name, "twiss.tfs.gz");
    assert_eq!(upload.compression, Some(tfsview::CompressionFormat::Gzip));
    let table = TfsLoader::default().load(&upload, None).unwrap();
    assert_eq!(table.column_names(), vec!["NAME", "S", "BETX", "BETY"]);
}

#[test]
fn load_errors_name_the_upload() {
    let upload = UploadedFile::new("broken.tfs", b"* A B\n$ %d %d\n1 x\n".to_vec());
    let inputs = Inputs {
        upload: Some(upload),
        ..Default::default()
    };
    let (session, eval) = evaluate(SessionState::new(), &inputs, &TfsLoader::default());
    assert!(session.table().is_none());
    assert!(eval.view.is_none());
    let errors: Vec<_> = eval.errors().collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("broken.tfs"));
}
