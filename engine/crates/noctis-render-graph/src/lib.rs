pub mod frame_graph;
