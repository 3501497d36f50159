pub(crate) mod devices;
pub(crate) mod player;
