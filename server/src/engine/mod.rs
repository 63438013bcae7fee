pub mod block_list;
pub mod channel;
pub mod lifecycle;
pub mod notices;
pub mod relay;
pub mod relay_loop;
pub mod session;
pub mod validation;
