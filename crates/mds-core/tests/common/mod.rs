pub mod stall_server;
