pub mod domain;
pub mod ports;

pub use domain::{
    AuthPolicy, AutosaveOverlap, AutosavePayload, Credentials, EditPatch, Note, NoteInput,
    NotePage, NoteQuery, NoteValidationError, RecordId, Registration, Session, SortOrder, User,
    Visibility,
};
pub use ports::{
    AutosaveTarget, HttpExchange, HttpMethod, HttpRequest, HttpResponse, PortError, PortResult,
    TokenStore,
};
