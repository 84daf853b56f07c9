mod event;

pub use event::{
    CHANGE_REQUEST_NUMBER_KEY, COMMIT_STATUS_KEY, COMMIT_STATUS_UPDATE_VALUE, Event,
    ObjectReference, PROGRESSING_REASON, REVISION_KEY, Severity,
};
