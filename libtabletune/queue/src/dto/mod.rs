pub(crate) mod bar_settings;
pub(crate) mod command;
pub(crate) mod queue_event;
pub(crate) mod queue_item;
pub(crate) mod queue_snapshot;
pub(crate) mod request;
pub(crate) mod request_error;
pub(crate) mod track;
