#![allow(dead_code)]

use std::cell::Cell;
use tfsview::tfs::TfsTable;
use tfsview::upload::{self, LoadError};
use tfsview::UploadedFile;

/// A small optics table: one string column, three numeric ones.
pub const TWISS: &str = r#"@ NAME             %s "TWISS"
@ ENERGY           %le 6800
@ NTURNS           %d  12
* NAME          S        BETX     BETY
$ %s            %le      %le      %le
"BPM.1"         0.0      10.5     32.1
"BPM.2"         12.5     48.0     9.75
"MQ.3"          25.0     120.25   18.5
"BPM.4"         37.5     15.0     80.0
"#;

/// The two-row table from the filtering walkthrough.
pub const SIMPLE: &str = "@ TITLE %s \"x\"\n* A B\n$ %d %d\n1 2\n5 9\n";

pub fn twiss_upload() -> UploadedFile {
    UploadedFile::new("twiss.tfs", TWISS.as_bytes().to_vec())
}

pub fn simple_upload() -> UploadedFile {
    UploadedFile::new("simple.tfs", SIMPLE.as_bytes().to_vec())
}

/// Wraps the real loader and counts how often it runs.
pub struct CountingLoader {
    pub calls: Cell<usize>,
}

impl CountingLoader {
    pub fn new() -> Self {
        Self {
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl tfsview::Loader for CountingLoader {
    fn load(&self, upload: &UploadedFile, index: Option<&str>) -> Result<TfsTable, LoadError> {
        self.calls.set(self.calls.get() + 1);
        upload::load_upload(upload, index)
    }
}
