mod common;
mod lifecycle;
mod safety_stop;
mod shutdown;
mod simulation;
