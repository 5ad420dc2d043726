//! Unit tests for the identifier newtypes
//!
//! Covers creation, parsing, conversion and display formatting for the
//! identifiers shared by the processing and verification crates.

use core_kernel::{
    ClaimId, DocumentId, JobId, BatchId, WorkflowId, StepId, AuditEntryId, UserId,
};
use uuid::Uuid;

mod claim_id_tests {
    use super::*;

    #[test]
    fn test_new_generates_unique_ids() {
        let id1 = ClaimId::new();
        let id2 = ClaimId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_new_v7_generates_time_ordered_ids() {
        let id1 = ClaimId::new_v7();
        std::thread::sleep(std::time::Duration::from_millis(1));
        let id2 = ClaimId::new_v7();
        let uuid1: Uuid = id1.into();
        let uuid2: Uuid = id2.into();
        assert!(uuid1 < uuid2);
    }

    #[test]
    fn test_from_uuid() {
        let uuid = Uuid::new_v4();
        let id = ClaimId::from_uuid(uuid);
        assert_eq!(*id.as_uuid(), uuid);
    }

    #[test]
    fn test_from_str_with_prefix() {
        let original = ClaimId::new();
        let parsed: ClaimId = original.to_string().parse().unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_from_str_without_prefix() {
        let uuid = Uuid::new_v4();
        let parsed: ClaimId = uuid.to_string().parse().unwrap();
        assert_eq!(*parsed.as_uuid(), uuid);
    }

    #[test]
    fn test_from_str_invalid() {
        let result: Result<ClaimId, _> = "CLM-not-a-uuid".parse();
        assert!(result.is_err());
    }
}

mod prefix_tests {
    use super::*;

    #[test]
    fn test_prefixes() {
        assert_eq!(ClaimId::prefix(), "CLM");
        assert_eq!(DocumentId::prefix(), "DOC");
        assert_eq!(JobId::prefix(), "JOB");
        assert_eq!(BatchId::prefix(), "BAT");
        assert_eq!(WorkflowId::prefix(), "WFL");
        assert_eq!(StepId::prefix(), "STP");
        assert_eq!(AuditEntryId::prefix(), "AUD");
        assert_eq!(UserId::prefix(), "USR");
    }

    #[test]
    fn test_display_uses_prefix() {
        assert!(JobId::new().to_string().starts_with("JOB-"));
        assert!(BatchId::new().to_string().starts_with("BAT-"));
        assert!(UserId::new().to_string().starts_with("USR-"));
    }
}

mod serde_tests {
    use super::*;

    #[test]
    fn test_serializes_transparently() {
        let uuid = Uuid::new_v4();
        let id = DocumentId::from_uuid(uuid);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", uuid));
    }
}

mod hashing_tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_usable_as_set_keys() {
        let a = JobId::new();
        let b = JobId::new();
        let set: HashSet<JobId> = [a, b, a].into_iter().collect();
        assert_eq!(set.len(), 2);
    }
}
