pub mod dialog;
pub mod dom;
pub mod emulation;
pub mod file_chooser;
pub mod load;
pub mod network_idle;
pub mod response;

pub use dialog::{DialogAction, DialogResult, wait_for_dialog};
pub use dom::{NodeReference, query, query_all};
pub use emulation::{
    clear_device_metrics, layout_metrics, set_device_metrics, set_geolocation, set_timezone,
    set_user_agent,
};
pub use file_chooser::{FileChooserResult, wait_for_file_chooser};
pub use load::{WaitUntil, wait_for_load};
pub use network_idle::wait_for_network_idle;
pub use response::{ResponseFilter, ResponseMatch, wait_for_response};
