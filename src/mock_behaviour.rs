//! This module provides ways to tweak a [`MemoryDav`](crate::memory::MemoryDav), so that it can return errors on some tests

use crate::error::DavError;

/// This stores some behaviour tweaks, that describe how a mocked instance will behave during a given test
///
/// So that a functions fails _n_ times after _m_ initial successes, set `(m, n)` for the suited parameter
#[derive(Default, Clone, Debug)]
pub struct MockBehaviour {
    /// If this is true, every action will be allowed
    pub is_suspended: bool,

    pub list_behaviour: (u32, u32),
    pub fetch_behaviour: (u32, u32),
    pub delete_behaviour: (u32, u32),
    pub upload_behaviour: (u32, u32),
}

impl MockBehaviour {
    pub fn new() -> Self {
        Self::default()
    }

    /// All actions will fail at once, for `n_fails` times
    pub fn fail_now(n_fails: u32) -> Self {
        Self {
            is_suspended: false,
            list_behaviour: (0, n_fails),
            fetch_behaviour: (0, n_fails),
            delete_behaviour: (0, n_fails),
            upload_behaviour: (0, n_fails),
        }
    }

    /// Suspend this mock behaviour until you call `resume`
    pub fn suspend(&mut self) {
        self.is_suspended = true;
    }
    /// Make this behaviour active again
    pub fn resume(&mut self) {
        self.is_suspended = false;
    }

    pub fn can_list(&mut self, path: &str) -> Result<(), DavError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.list_behaviour, "list")
            .map_err(|reason| DavError::ListingFailed { path: path.to_string(), reason })
    }
    pub fn can_fetch(&mut self, path: &str) -> Result<(), DavError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.fetch_behaviour, "fetch")
            .map_err(|reason| DavError::DownloadFailed { path: path.to_string(), reason })
    }
    pub fn can_delete(&mut self, path: &str) -> Result<(), DavError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.delete_behaviour, "delete")
            .map_err(|reason| DavError::DeleteFailed { path: path.to_string(), reason })
    }
    pub fn can_upload(&mut self, path: &str) -> Result<(), DavError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.upload_behaviour, "upload")
            .map_err(|reason| DavError::UploadFailed { path: path.to_string(), reason })
    }
}


/// Return Ok(()) in case the value is `(1+, _)` or `(_, 0)`, or return Err and decrement otherwise
fn decrement(value: &mut (u32, u32), descr: &str) -> Result<(), String> {
    let remaining_successes = value.0;
    let remaining_failures = value.1;

    if remaining_successes > 0 {
        value.0 = value.0 - 1;
        log::debug!("Mock behaviour: allowing a {} ({:?})", descr, value);
        Ok(())
    } else {
        if remaining_failures > 0 {
            value.1 = value.1 - 1;
            log::debug!("Mock behaviour: failing a {} ({:?})", descr, value);
            Err(format!("Mocked behaviour requires this {} to fail this time. ({:?})", descr, value))
        } else {
            log::debug!("Mock behaviour: allowing a {} ({:?})", descr, value);
            Ok(())
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_mock_behaviour() {
        let mut ok = MockBehaviour::new();
        for _ in 0..5 {
            assert!(ok.can_list("/").is_ok());
            assert!(ok.can_delete("/a").is_ok());
        }

        let mut now = MockBehaviour::fail_now(2);
        assert!(now.can_list("/").is_err());
        assert!(now.can_fetch("/a").is_err());
        assert!(now.can_fetch("/a").is_err());
        assert!(now.can_list("/").is_err());
        assert!(now.can_list("/").is_ok());
        assert!(now.can_list("/").is_ok());
        assert!(now.can_fetch("/a").is_ok());

        let mut custom = MockBehaviour{
            list_behaviour: (0,1),
            delete_behaviour: (1,3),
            ..MockBehaviour::default()
        };
        assert!(matches!(custom.can_list("/x/"), Err(DavError::ListingFailed { .. })));
        assert!(custom.can_list("/x/").is_ok());
        assert!(custom.can_delete("/a").is_ok());
        assert!(matches!(custom.can_delete("/a"), Err(DavError::DeleteFailed { .. })));
        assert!(custom.can_delete("/a").is_err());
        assert!(custom.can_delete("/a").is_err());
        assert!(custom.can_delete("/a").is_ok());

        custom.upload_behaviour = (0, 1);
        custom.suspend();
        assert!(custom.can_upload("/a").is_ok());
        custom.resume();
        assert!(custom.can_upload("/a").is_err());
        assert!(custom.can_upload("/a").is_ok());
    }
}
