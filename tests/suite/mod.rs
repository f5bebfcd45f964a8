mod process;
mod scenario;
